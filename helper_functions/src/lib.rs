pub mod accessors;
pub mod error;
pub mod fork_choice;
pub mod misc;
pub mod mutators;
pub mod predicates;
pub mod signing;
pub mod verifier;
