use serde::{Deserialize, Serialize};

use crate::models::{ChatPeer, Message, MessageTarget, ReactionOutcome, SendStatus, UserId};

// -- JWT Claims --

/// JWT claims issued by the external auth service. Shared by the REST
/// middleware and the WebSocket gateway upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(flatten)]
    pub target: MessageTarget,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub status: SendStatus,
    /// Present once the message has a store id.
    pub message: Option<Message>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub message: Message,
    pub reactions: Vec<ReactionGroup>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub action: String,
    #[serde(default)]
    pub reaction_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub outcome: ReactionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub reaction_type: String,
    pub count: usize,
    pub user_ids: Vec<UserId>,
}

// -- Chat list --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub peer: ChatPeer,
}
