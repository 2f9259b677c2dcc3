//! Game Analysis Module
//!
//! Feature extraction from move lists, the archetype taxonomy, and the
//! classification strategies that map one onto the other.

pub mod archetype;
pub mod classify;
pub mod features;

pub use archetype::{Archetype, ArchetypeCatalog, ArchetypeProfile, FavoredSide};
pub use classify::{
    Classifier, ClassifierThresholds, RuleClassifier, SynapticClassifier, SynapticWeights,
};
pub use features::{
    extract, extract_from_text, move_prefix, parse_moves, ply_count, FeatureSignature,
};
