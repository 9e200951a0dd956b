mod entry_flow;
mod runtime_channels;
mod seeding;
