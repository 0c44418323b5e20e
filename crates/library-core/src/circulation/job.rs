//! The job type `CirculationDesk` queues and drains.

/// A unit of background work, tagged by the topic (or turn text) it acts
/// on. A sum type rather than a dynamic payload, so `drain` can match on
/// the variant exhaustively (spec §9 "tagged records for job kinds").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Extract atomic facts from a turn of conversation text.
    Extraction { turn: String },
    /// Summarize a topic's volumes into a compendium, if it still has
    /// enough members.
    Compendium { topic: String },
    /// Propose and apply a reorganization (moves/merges) for an
    /// over-grown topic.
    Reorganization { topic: String },
    /// Prune, optionally summarize, and reorganize a topic in one pass.
    Optimization { topic: String },
}
