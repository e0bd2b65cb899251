//! Registration state machine: tracks which step the user is in.

use serde::{Deserialize, Serialize};

/// The steps of the registration conversation.
///
/// Progresses linearly: SelectLang → CheckSub → GetHandle → GetRealName →
/// ChooseProductCategory → ChooseProductVariant → End. Failed steps stay
/// where they are; any out-of-flow event jumps straight to End.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    SelectLang,
    CheckSub,
    GetHandle,
    GetRealName,
    ChooseProductCategory,
    ChooseProductVariant,
    End,
}

impl ConversationState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;
        if *self == End {
            return false;
        }
        // Retrying a step and abandoning the flow are always allowed.
        if target == *self || target == End {
            return true;
        }
        self.next() == Some(target)
    }

    /// Whether this state is terminal (the session is discarded).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Get the next state in the linear progression, if any.
    pub fn next(&self) -> Option<ConversationState> {
        use ConversationState::*;
        match self {
            SelectLang => Some(CheckSub),
            CheckSub => Some(GetHandle),
            GetHandle => Some(GetRealName),
            GetRealName => Some(ChooseProductCategory),
            ChooseProductCategory => Some(ChooseProductVariant),
            ChooseProductVariant => Some(End),
            End => None,
        }
    }

    /// What input this state waits for, for logs.
    pub fn expects(&self) -> &'static str {
        match self {
            Self::SelectLang => "language button",
            Self::CheckSub => "subscription confirmation",
            Self::GetHandle => "directory login text",
            Self::GetRealName => "real name text",
            Self::ChooseProductCategory => "logo category button",
            Self::ChooseProductVariant => "logo variant button",
            Self::End => "nothing",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SelectLang => "SELECT_LANG",
            Self::CheckSub => "CHECK_SUB",
            Self::GetHandle => "GET_HANDLE",
            Self::GetRealName => "GET_REAL_NAME",
            Self::ChooseProductCategory => "CHOOSE_PRODUCT_CATEGORY",
            Self::ChooseProductVariant => "CHOOSE_PRODUCT_VARIANT",
            Self::End => "END",
        };
        write!(f, "{s}")
    }
}
