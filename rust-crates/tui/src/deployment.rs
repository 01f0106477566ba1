pub use deployments::*;
