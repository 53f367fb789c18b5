//! Owners' assemblies: convocation, weighted quorum, live votings, minutes and their signatures.
//!
//! Every realtime event of an assembly goes to its own `assembly-{schema}-{id}` channel.
//! Vote values are never broadcast; subscribers only learn the running vote count.

mod domain;
mod minutes;
mod router;
mod rules;
mod service;

pub use domain::{
    AgendaItem, Assembly, AssemblyClosure, AssemblyFilter, AssemblyMinutes, AssemblyStatus,
    AssemblyType, AssemblyUpdate, AttendanceType, Attendee, DigitalSignature, MinutesStatus,
    NewAssembly, NewAttendance, NewVote, NewVoting, OptionResult, OptionTally, PercentageBase,
    QuorumSnapshot, QuorumStatus, SignatureContext, SignatureStatus, Signer, Vote, Voting,
    VotingResults, VotingStatus, VotingType,
};
pub use minutes::{
    render_minutes, DocumentError, DocumentRenderer, Sha256Signer, SignatureError,
    SignatureProvider, SignatureRequest, StoredDocumentRenderer,
};
pub use router::assemblies_router;
pub use rules::{default_options, is_approved, tally, Tally, ABSTAIN, NO, YES};
pub use service::{AssemblyService, ASSEMBLIES_CHANNEL};
