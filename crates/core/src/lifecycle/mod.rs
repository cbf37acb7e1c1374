//! Intermediate files and final output placement.
//!
//! Every job owns a [`TempRegistry`] for the files it creates along the way
//! (extracted and time-stretched audio). The registry is emptied when the
//! job finishes, whatever the outcome. That includes the staged output: an
//! encoder writes it (or the source is [`relocate`]d onto it) next to the
//! destination, and only a successful job moves it into place with
//! [`commit_output`]. A failed job therefore never touches the destination.

mod error;
mod placement;
mod temp;

pub use error::{PlacementError, TempFileError};
pub use placement::{commit_output, discard_output, relocate, Relocation, RelocationMethod};
pub use temp::TempRegistry;
