//! Conversation stages — the fixed finite set of points in the intake flow.

use serde::{Deserialize, Serialize};

/// A stage in the conversation sequence.
///
/// The happy path runs linearly:
/// AwaitingName → AwaitingEmail → Menu → (intro branch) → AskingPeriod →
/// AskingDuration → AskingDestination → AskingContactMethod →
/// AskingContactTime → ServiceRequested (terminal, re-entrant).
///
/// `Menu` is a hub: reachable from PostInterests when the client declines
/// planning, and via the literal "menu" command once the name is known.
///
/// Serialized names are the persisted wire format; changing them breaks
/// existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "aguardando_nome")]
    AwaitingName,
    #[serde(rename = "aguardando_email")]
    AwaitingEmail,
    #[serde(rename = "menu")]
    Menu,
    #[serde(rename = "pos_conhecer_tripulacao")]
    PostIntro,
    #[serde(rename = "perguntando_interesses")]
    AskingInterests,
    #[serde(rename = "apos_interesses")]
    PostInterests,
    #[serde(rename = "perguntando_periodo_viagem")]
    AskingPeriod,
    #[serde(rename = "perguntando_duracao")]
    AskingDuration,
    #[serde(rename = "perguntando_destino")]
    AskingDestination,
    #[serde(rename = "perguntando_forma_contato")]
    AskingContactMethod,
    #[serde(rename = "perguntando_horario")]
    AskingContactTime,
    #[serde(rename = "atendimento_solicitado")]
    ServiceRequested,
}

impl Stage {
    /// The persisted wire name of this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingName => "aguardando_nome",
            Self::AwaitingEmail => "aguardando_email",
            Self::Menu => "menu",
            Self::PostIntro => "pos_conhecer_tripulacao",
            Self::AskingInterests => "perguntando_interesses",
            Self::PostInterests => "apos_interesses",
            Self::AskingPeriod => "perguntando_periodo_viagem",
            Self::AskingDuration => "perguntando_duracao",
            Self::AskingDestination => "perguntando_destino",
            Self::AskingContactMethod => "perguntando_forma_contato",
            Self::AskingContactTime => "perguntando_horario",
            Self::ServiceRequested => "atendimento_solicitado",
        }
    }

    /// Whether this stage is terminal. The terminal stage is re-entrant: it
    /// keeps answering, but never transitions out on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ServiceRequested)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aguardando_nome" => Ok(Self::AwaitingName),
            "aguardando_email" => Ok(Self::AwaitingEmail),
            "menu" => Ok(Self::Menu),
            "pos_conhecer_tripulacao" => Ok(Self::PostIntro),
            "perguntando_interesses" => Ok(Self::AskingInterests),
            "apos_interesses" => Ok(Self::PostInterests),
            "perguntando_periodo_viagem" => Ok(Self::AskingPeriod),
            "perguntando_duracao" => Ok(Self::AskingDuration),
            "perguntando_destino" => Ok(Self::AskingDestination),
            "perguntando_forma_contato" => Ok(Self::AskingContactMethod),
            "perguntando_horario" => Ok(Self::AskingContactTime),
            "atendimento_solicitado" => Ok(Self::ServiceRequested),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const ALL: [Stage; 12] = [
        Stage::AwaitingName,
        Stage::AwaitingEmail,
        Stage::Menu,
        Stage::PostIntro,
        Stage::AskingInterests,
        Stage::PostInterests,
        Stage::AskingPeriod,
        Stage::AskingDuration,
        Stage::AskingDestination,
        Stage::AskingContactMethod,
        Stage::AskingContactTime,
        Stage::ServiceRequested,
    ];

    #[test]
    fn wire_names_round_trip() {
        for stage in ALL {
            assert_eq!(Stage::from_str(stage.as_str()), Ok(stage));
        }
    }

    #[test]
    fn display_matches_serde() {
        for stage in ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
    }

    #[test]
    fn unknown_stage_rejected() {
        assert!(Stage::from_str("navegando").is_err());
    }

    #[test]
    fn only_service_requested_is_terminal() {
        for stage in ALL {
            assert_eq!(stage.is_terminal(), stage == Stage::ServiceRequested);
        }
    }
}
