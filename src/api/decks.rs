use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::GatewayError;
use crate::gateway::{ApiRequest, Gateway};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub entry: String,
    pub value: String,
}

#[derive(Serialize, Deserialize)]
struct CardList {
    cards: Vec<Card>,
}

/// Which cards `next_card` may pick from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    #[default]
    All,
    Learned,
    Unlearned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyCard {
    pub id: i64,
    pub entry: String,
    pub value: String,
    pub learned: bool,
}

/// Deck progress. `remain` is only reported by `next_card`, and is `None`
/// once nothing is left to study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub learned: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remain: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCard {
    pub card: Option<StudyCard>,
    pub stats: Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResult {
    pub learned: bool,
    pub stats: Stats,
}

#[derive(Debug, Clone)]
pub struct ExportedDeck {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Serialize)]
struct DeckName<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct NextCardQuery<'a> {
    mode: StudyMode,
    exclude: &'a [i64],
}

#[derive(Serialize)]
struct ToggleLearned {
    card_id: i64,
}

pub struct DeckApi {
    gateway: Arc<Gateway>,
    decks_path: String,
}

impl DeckApi {
    /// `decks_path` is the collection endpoint, e.g. `/api/decks`.
    pub fn new(gateway: Arc<Gateway>, decks_path: &str) -> Self {
        Self {
            gateway,
            decks_path: decks_path.trim_end_matches('/').to_string(),
        }
    }

    fn deck_path(&self, deck_id: i64, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/{}/{}", self.decks_path, deck_id, action),
            None => format!("{}/{}", self.decks_path, deck_id),
        }
    }

    /// The caller's decks, or every deck when `show_all` is set.
    pub async fn list(&self, show_all: bool) -> Result<Vec<Deck>, GatewayError> {
        let mut request = ApiRequest::get(self.decks_path.as_str());
        if show_all {
            request = request.query("show_all", "1");
        }
        self.gateway.send_json(request).await
    }

    pub async fn create(&self, name: &str) -> Result<Deck, GatewayError> {
        let request = ApiRequest::post(self.decks_path.as_str()).json(&DeckName { name })?;
        self.gateway.send_json(request).await
    }

    pub async fn rename(&self, deck_id: i64, name: &str) -> Result<Deck, GatewayError> {
        let request = ApiRequest::put(self.deck_path(deck_id, None)).json(&DeckName { name })?;
        self.gateway.send_json(request).await
    }

    pub async fn delete(&self, deck_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .send(ApiRequest::delete(self.deck_path(deck_id, None)))
            .await?;
        Ok(())
    }

    pub async fn cards(&self, deck_id: i64) -> Result<Vec<Card>, GatewayError> {
        let list: CardList = self
            .gateway
            .get_json(&self.deck_path(deck_id, Some("cards")))
            .await?;
        Ok(list.cards)
    }

    /// Replace the whole card list of a deck; returns the stored list.
    pub async fn replace_cards(&self, deck_id: i64, cards: Vec<Card>) -> Result<Vec<Card>, GatewayError> {
        let request =
            ApiRequest::put(self.deck_path(deck_id, Some("cards"))).json(&CardList { cards })?;
        let list: CardList = self.gateway.send_json(request).await?;
        Ok(list.cards)
    }

    /// Download the deck as a spreadsheet.
    pub async fn export(&self, deck_id: i64) -> Result<ExportedDeck, GatewayError> {
        let response = self
            .gateway
            .send(ApiRequest::get(self.deck_path(deck_id, Some("export"))))
            .await?;
        let filename = response
            .filename()
            .unwrap_or_else(|| format!("deck-{}.xlsx", deck_id));
        debug!("Exported deck {} as '{}'", deck_id, filename);
        Ok(ExportedDeck {
            filename,
            bytes: response.into_bytes(),
        })
    }

    /// Upload a spreadsheet that replaces the deck's cards.
    pub async fn import(&self, deck_id: i64, filename: &str, data: &[u8]) -> Result<(), GatewayError> {
        let content_type = if filename.ends_with(".xls") {
            XLS_CONTENT_TYPE
        } else {
            XLSX_CONTENT_TYPE
        };
        let request = ApiRequest::post(self.deck_path(deck_id, Some("import")))
            .multipart_file("file", filename, content_type, data)?;
        self.gateway.send(request).await?;
        Ok(())
    }

    /// Pick the next card to study, skipping the ids in `exclude`.
    pub async fn next_card(
        &self,
        deck_id: i64,
        mode: StudyMode,
        exclude: &[i64],
    ) -> Result<NextCard, GatewayError> {
        let request = ApiRequest::post(self.deck_path(deck_id, Some("next-card")))
            .json(&NextCardQuery { mode, exclude })?;
        self.gateway.send_json(request).await
    }

    pub async fn toggle_learned(&self, deck_id: i64, card_id: i64) -> Result<ToggleResult, GatewayError> {
        let request = ApiRequest::patch(self.deck_path(deck_id, Some("toggle_learned")))
            .json(&ToggleLearned { card_id })?;
        self.gateway.send_json(request).await
    }

    pub async fn reset_progress(&self, deck_id: i64) -> Result<(), GatewayError> {
        self.gateway
            .send(ApiRequest::delete(self.deck_path(deck_id, Some("reset"))))
            .await?;
        Ok(())
    }
}
