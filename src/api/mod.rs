//! Typed calls to the flashcards API, all routed through the gateway.

pub mod account;
pub mod decks;

pub use account::{AccountApi, Color, Language, NewAccount, Profile, Registered, Settings};
pub use decks::{Card, Deck, DeckApi, ExportedDeck, NextCard, Stats, StudyCard, StudyMode, ToggleResult};
