//! Consensus engine.
//!
//! One request flows through four stages:
//!
//! - **Dispatch**: every selected provider is queried concurrently
//! - **Filter**: results with an error or empty output are dropped
//! - **Vote**: valid answers are grouped by canonical key
//! - **Decide**: a unique winner is the majority answer; a tie goes to the
//!   judge model
//!
//! ## Example
//!
//! ```rust,ignore
//! use magi::consensus::ConsensusCoordinator;
//! use magi::types::requests::ConsensusRequest;
//!
//! let coordinator = ConsensusCoordinator::from_config(&config)?;
//! let response = coordinator.run(&ConsensusRequest::new("2+2?")).await?;
//! println!("{} ({})", response.final_answer, response.decided_by);
//! ```

mod coordinator;
mod dispatcher;
mod judge;
mod voter;

pub use coordinator::{no_valid_answers, ConsensusCoordinator, Phase};
pub use dispatcher::{Dispatch, Dispatcher};
pub use judge::{build_judge_prompt, parse_verdict, Judge, JUDGE_SYSTEM};
pub use voter::{canonicalize, voter_for, ExactVoter, KeywordClusterVoter, TallyEntry, VoteTally, Voter};
