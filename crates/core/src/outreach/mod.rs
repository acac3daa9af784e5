//! Cold-outreach lead qualification: a continue/stop gate followed by a short
//! qualifying conversation, one lead at a time.

pub mod gate;
pub mod qualifier;
pub mod sequencer;

pub use gate::{classify_reply, GateReply};
pub use qualifier::{
    parse_tagged_reply, KeywordQualifier, KeywordQualifierConfig, QualificationRequest, Qualifier,
    QualifierError, QualifierReply, Verdict,
};
pub use sequencer::{
    LeadSequencer, PotentialLead, ReplyOutcome, SequencerPolicy, SequencerStatus, SkipOutcome,
    StartOutcome, FAREWELL_MESSAGE, OPENING_MESSAGE,
};
