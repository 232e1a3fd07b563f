pub mod auth;
pub mod chunker;
pub mod combiner;
pub mod playback;
pub mod scheduler;
pub mod store;
pub mod tts;

// Re-export commonly used types for convenience
pub use auth::{AuthGate, AuthRequired, Identity, StaticAuthGate};
pub use chunker::{ChunkerConfig, Segment, chunk_text};
pub use combiner::{CombinationError, CombinedAsset, Combiner, SegmentResult};
pub use playback::{AudioOutput, NullOutput, PlaybackError, PlaybackOutcome, PlaybackQueue};
#[cfg(feature = "playback")]
pub use playback::DeviceOutput;
pub use scheduler::{CombinationHandle, SpeakOptions, SpeakOutcome, SpeakSource, SpeechPipeline};
pub use store::{AudioStore, CombinedHandle, MemoryStore, MemoryStoreConfig, StoreError};

pub use tts::{
    AudioFormat, DualTransportClient, LatencyMode, SessionRegistry, SpeechSynthesizer,
    SynthesisConfig, SynthesisError, SynthesisResult, TransportPath,
};
