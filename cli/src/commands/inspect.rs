use clap::Args;
use spotter_core::config::ResolutionConfig;
use spotter_core::feedback::KeywordFeedbackClassifier;
use spotter_core::signals::KeywordSignalExtractor;

use crate::util::print_json;

#[derive(Args)]
pub struct MessageArgs {
    /// Raw user message
    #[arg(long, short = 'm')]
    pub message: String,
}

/// Deterministic target-signal extraction for one message.
pub fn signals(args: MessageArgs, raw: bool) -> i32 {
    print_json(&KeywordSignalExtractor::extract_signals(&args.message), raw)
}

/// Deterministic feedback detection and outcome classification.
pub fn classify(config: &ResolutionConfig, args: MessageArgs, raw: bool) -> i32 {
    let classifier = KeywordFeedbackClassifier::new(config.outcome_text_limit);
    print_json(&classifier.classify_message(&args.message), raw)
}
