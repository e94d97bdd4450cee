pub mod board;
pub mod deck;
pub mod machine;

pub use board::{BoardSide, BoardState, Buckets, NegotiationBoard, SortStrategy};
pub use deck::{DeckError, DeckState, NegotiationDeck, notify_counterparty};
pub use machine::Phase;
