#![deny(missing_docs)]
#![doc = "Core error, likelihood and seeding types shared by the FPP batch crates."]

pub mod errors;
pub mod likelihood;
pub mod provenance;
pub mod rng;

pub use errors::{ErrorInfo, FailureKind, FppError};
pub use likelihood::{odds_label, LikelihoodTable, ModelLikelihood, DEFAULT_FPPV, PLANET_MODEL};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, SubstreamSeeds};
