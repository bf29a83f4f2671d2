//! Catalog metadata and the physical book item state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Barcode, Isbn};

/// Catalog metadata for a title. One `Book` has many `BookItem`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    pub subject: String,
    pub publisher: String,
    pub language: String,
    pub number_of_pages: u32,
}

/// Physical format of a book item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BookFormat {
    #[default]
    Hardcover,
    Paperback,
    AudioBook,
    EBook,
    Newspaper,
}

impl BookFormat {
    /// Returns the format name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Hardcover => "Hardcover",
            BookFormat::Paperback => "Paperback",
            BookFormat::AudioBook => "AudioBook",
            BookFormat::EBook => "EBook",
            BookFormat::Newspaper => "Newspaper",
        }
    }

    /// Parses a format from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Hardcover" => Some(BookFormat::Hardcover),
            "Paperback" => Some(BookFormat::Paperback),
            "AudioBook" => Some(BookFormat::AudioBook),
            "EBook" => Some(BookFormat::EBook),
            "Newspaper" => Some(BookFormat::Newspaper),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a physical book item.
///
/// State transitions:
/// ```text
/// Available ──► Issued ──► Available          (normal cycle)
/// Available ──► Reserved ──► Issued           (reservation-fulfilled cycle)
/// any state ──► Lost                          (administrative)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    /// On the shelf, free to borrow or reserve.
    #[default]
    Available,

    /// Held for an account; only that account may check it out.
    Reserved,

    /// Checked out; an open lending exists for it.
    Issued,

    /// Administratively written off.
    Lost,
}

impl ItemStatus {
    /// Returns true if the item is currently reserved.
    pub fn is_reserved(&self) -> bool {
        matches!(self, ItemStatus::Reserved)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "Available",
            ItemStatus::Reserved => "Reserved",
            ItemStatus::Issued => "Issued",
            ItemStatus::Lost => "Lost",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(ItemStatus::Available),
            "Reserved" => Some(ItemStatus::Reserved),
            "Issued" => Some(ItemStatus::Issued),
            "Lost" => Some(ItemStatus::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an item cannot be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveRefusal {
    ReferenceOnly,
    AlreadyReserved,
    CheckedOut,
    Lost,
}

impl ReserveRefusal {
    /// Returns the human-readable refusal reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ReserveRefusal::ReferenceOnly => "Reference only Book",
            ReserveRefusal::AlreadyReserved => "Already Reserved",
            ReserveRefusal::CheckedOut => "Checked Out",
            ReserveRefusal::Lost => "Lost",
        }
    }
}

impl std::fmt::Display for ReserveRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A physical circulating copy, tracked by barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookItem {
    pub barcode: Barcode,
    pub isbn: Isbn,
    pub is_reference_only: bool,
    pub status: ItemStatus,
    pub format: BookFormat,
    pub price: u32,
    pub borrowed_at: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub date_of_purchase: NaiveDate,
    pub placement: String,
}

impl BookItem {
    /// Returns true if the item can be handed out right now.
    ///
    /// Reserved items are handled separately by the lending workflow, which
    /// allows the reserving account itself to check the item out.
    pub fn can_be_issued(&self) -> bool {
        !self.is_reference_only && self.status == ItemStatus::Available
    }

    /// Checks whether a hold may be placed on this item.
    ///
    /// Only `Available` items are reservable; an issued or lost copy cannot
    /// be promised to anyone.
    pub fn can_be_reserved(&self) -> Result<(), ReserveRefusal> {
        if self.is_reference_only {
            return Err(ReserveRefusal::ReferenceOnly);
        }
        match self.status {
            ItemStatus::Available => Ok(()),
            ItemStatus::Reserved => Err(ReserveRefusal::AlreadyReserved),
            ItemStatus::Issued => Err(ReserveRefusal::CheckedOut),
            ItemStatus::Lost => Err(ReserveRefusal::Lost),
        }
    }

    /// Returns true if the item is currently reserved.
    pub fn is_reserved(&self) -> bool {
        self.status.is_reserved()
    }
}
