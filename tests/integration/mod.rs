mod admin;
mod chat_completions;
mod prober;
