//! Prompt templates for the generative paths, rendered with tera.

use tera::{Context, Tera};

const CHAT_REPLY: &str = "chat_reply.txt";
const FIRST_VISIT: &str = "first_visit.txt";
const RETURN_VISIT: &str = "return_visit.txt";
const ANNOUNCEMENT: &str = "announcement.txt";

const CHAT_REPLY_TEMPLATE: &str = r#"You are a fun, engaging Twitch chat bot named "{{ bot_name }}".
Your job is to keep viewers engaged by responding naturally to chat messages.

Personality:
- Friendly, humorous, and supportive
- Use gaming/streaming references
- Keep responses short (1-2 sentences, under 200 chars)
- Use emojis occasionally
- Be conversational and natural
- Never be offensive or inappropriate

Current chat context (recent messages):
{{ context }}

Now {{ username }} said: "{{ message }}"

Generate a natural, engaging response that fits the conversation. Be helpful if they asked a question, funny if appropriate, and always keep the vibe positive!

Just return your response, nothing else."#;

const FIRST_VISIT_TEMPLATE: &str = r#"Generate a warm, welcoming message for a FIRST-TIME viewer named "{{ username }}" joining a Twitch stream.

Make it special since it's their first visit!

Requirements:
- Keep it under 200 characters
- Make it extra welcoming for new viewers
- Humorous and friendly
- Reference that they're new/first time
- Gaming/streaming culture references welcome
- No offensive content
- Just return the welcome text, nothing else"#;

const RETURN_VISIT_TEMPLATE: &str = r#"Generate a fun welcome-back message for "{{ username }}" who is returning to the Twitch stream (visit #{{ visits }}).

Show you remember them!

Requirements:
- Keep it under 200 characters
- Reference that they're returning/came back
- Make it feel personal and engaging
- Humorous and friendly
- Can mention they're a regular or familiar face
- No offensive content
- Just return the welcome text, nothing else"#;

const ANNOUNCEMENT_TEMPLATE: &str = r#"You are a Twitch streamer greeting your chat. Generate a super creative, fun, and unique welcome message.

Requirements:
- Must be SHORT (1-2 sentences max, under 200 characters)
- Should be welcoming and energetic
- Can include 1-2 emojis
- Should feel spontaneous and different each time
- Can be funny, epic, wholesome, or hype
- Vary the style: sometimes casual, sometimes epic, sometimes quirky
- Don't repeat common phrases
- Write as if YOU (the streamer) are talking to YOUR community
- Address "chat", "everyone", "legends", "fam", "viewers" etc.
- Use FIRST PERSON perspective (I, we, my, our)

Examples of variety:
- "Yo! Stream's cooking! 🔥"
- "Love having you all here! Let's make it epic 🌟"
- "The vibe is immaculate today! Welcome in! ✨"
- "We're live! Let's gooo 🚀"
- "Chat is buzzing! Love to see it 💜"
- "Welcome to the chaos, legends! 🎪"

Generate ONE unique welcome message NOW (just the message, nothing else):"#;

#[derive(Debug)]
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (CHAT_REPLY, CHAT_REPLY_TEMPLATE),
            (FIRST_VISIT, FIRST_VISIT_TEMPLATE),
            (RETURN_VISIT, RETURN_VISIT_TEMPLATE),
            (ANNOUNCEMENT, ANNOUNCEMENT_TEMPLATE),
        ])?;
        tera.autoescape_on(Vec::new());
        Ok(Self { tera })
    }

    /// System prompt for a chat reply. The viewer's message is also sent on
    /// its own as the user turn.
    pub fn chat_reply(
        &self,
        bot_name: &str,
        context: &str,
        username: &str,
        message: &str,
    ) -> Result<String, tera::Error> {
        let mut ctx = Context::new();
        ctx.insert("bot_name", bot_name);
        ctx.insert("context", context);
        ctx.insert("username", username);
        ctx.insert("message", message);
        self.tera.render(CHAT_REPLY, &ctx)
    }

    pub fn join_greeting(&self, username: &str, visits: u32) -> Result<String, tera::Error> {
        let mut ctx = Context::new();
        ctx.insert("username", username);
        ctx.insert("visits", &visits);
        let template = if visits <= 1 { FIRST_VISIT } else { RETURN_VISIT };
        self.tera.render(template, &ctx)
    }

    pub fn announcement(&self) -> Result<String, tera::Error> {
        self.tera.render(ANNOUNCEMENT, &Context::new())
    }
}

#[cfg(test)]
mod tests {
    use super::PromptLibrary;

    fn library() -> PromptLibrary {
        match PromptLibrary::new() {
            Ok(library) => library,
            Err(error) => panic!("templates should compile: {error}"),
        }
    }

    #[test]
    fn chat_reply_embeds_context_and_message_verbatim() {
        let prompt = library()
            .chat_reply("Chatterbox", "alice: hi\nbob: <3 & stuff", "carol", "what's up?")
            .unwrap_or_default();

        assert!(prompt.contains(r#"named "Chatterbox""#));
        assert!(prompt.contains("alice: hi\nbob: <3 & stuff"));
        assert!(prompt.contains(r#"Now carol said: "what's up?""#));
    }

    #[test]
    fn join_greeting_switches_on_visit_count() {
        let library = library();
        let first = library.join_greeting("dave", 1).unwrap_or_default();
        let again = library.join_greeting("dave", 3).unwrap_or_default();

        assert!(first.contains("FIRST-TIME viewer named \"dave\""));
        assert!(again.contains("(visit #3)"));
    }

    #[test]
    fn announcement_renders() {
        assert!(library().announcement().unwrap_or_default().contains("ONE unique welcome"));
    }
}
