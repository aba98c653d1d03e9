pub mod bridge;
pub mod events;
pub mod live;
pub mod turns;

// Re-export commonly used types for convenience
pub use bridge::{BridgeError, BridgeRequest, BridgeState, FrameStream, SessionBridge};

pub use events::{OutboundEvent, encode_frame, parse_frames};

pub use live::{
    GeminiLiveConfig, GeminiLiveConnector, LiveConnection, LiveConnector, LiveCredential,
    LiveError, LiveEvent, LiveResult, LiveSession, LiveTarget, ProbeFailure,
};

pub use turns::{DEFAULT_TURN, TurnInput, TurnSequence, normalize_turns};
