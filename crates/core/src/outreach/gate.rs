use serde::{Deserialize, Serialize};

/// How a lead answered the opening continue/stop prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReply {
    Continue,
    Stop,
    Other,
}

/// Classifies a reply by whole-word, case-insensitive match after trimming.
/// `STOP` wins over `CONTINUE` when both appear.
pub fn classify_reply(message: &str) -> GateReply {
    let mut saw_continue = false;
    for token in message.trim().split(|ch: char| !ch.is_ascii_alphanumeric()) {
        if token.eq_ignore_ascii_case("stop") {
            return GateReply::Stop;
        }
        if token.eq_ignore_ascii_case("continue") {
            saw_continue = true;
        }
    }

    if saw_continue {
        GateReply::Continue
    } else {
        GateReply::Other
    }
}
