//! Mock proximity reader implementation for testing and development.
//!
//! Cards are presented through a [`MockProximityReaderHandle`]; each
//! presentation is reported exactly once by
//! [`poll_new_card`](ProximityReader::poll_new_card), which mirrors a real
//! reader that only reports cards newly entering the field.

use crate::{
    HardwareError, Result,
    traits::ProximityReader,
    types::ReaderInfo,
};
use rollcall_core::CardId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Pending presentations the mock buffers before reporting the reader busy.
const PRESENTATION_QUEUE: usize = 32;

/// Mock proximity card reader.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockProximityReader;
/// use rollcall_hardware::traits::ProximityReader;
/// use rollcall_core::CardId;
///
/// #[tokio::main]
/// async fn main() -> rollcall_hardware::Result<()> {
///     let (mut reader, handle) = MockProximityReader::new();
///
///     assert!(reader.poll_new_card().await?.is_none());
///
///     handle.present_card(CardId::from_hex("04ABCDEF").unwrap())?;
///     let card = reader.poll_new_card().await?.unwrap();
///     assert_eq!(card.to_hex(), "04ABCDEF");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockProximityReader {
    card_rx: mpsc::Receiver<CardId>,
    name: String,
    shared: Arc<ReaderShared>,
}

#[derive(Debug)]
struct ReaderShared {
    connected: AtomicBool,
    halts: AtomicU64,
}

impl MockProximityReader {
    /// Create a new mock reader with the default name.
    ///
    /// Returns the reader and a handle used to present cards.
    pub fn new() -> (Self, MockProximityReaderHandle) {
        Self::with_name("Mock MFRC522".to_string())
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: String) -> (Self, MockProximityReaderHandle) {
        let (card_tx, card_rx) = mpsc::channel(PRESENTATION_QUEUE);
        let shared = Arc::new(ReaderShared {
            connected: AtomicBool::new(true),
            halts: AtomicU64::new(0),
        });

        let reader = Self {
            card_rx,
            name,
            shared: Arc::clone(&shared),
        };
        let handle = MockProximityReaderHandle { card_tx, shared };

        (reader, handle)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.shared.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(HardwareError::disconnected(&self.name))
        }
    }
}

impl Default for MockProximityReader {
    fn default() -> Self {
        Self::new().0
    }
}

impl ProximityReader for MockProximityReader {
    async fn poll_new_card(&mut self) -> Result<Option<CardId>> {
        self.ensure_connected()?;

        match self.card_rx.try_recv() {
            Ok(card) => Ok(Some(card)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HardwareError::disconnected(format!(
                "{}: presentation channel closed",
                self.name
            ))),
        }
    }

    async fn halt(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.shared.halts.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        Ok(ReaderInfo::new(
            self.name.clone(),
            vec!["ISO14443A".to_string()],
        ))
    }
}

/// Handle for controlling a mock proximity reader.
#[derive(Debug, Clone)]
pub struct MockProximityReaderHandle {
    card_tx: mpsc::Sender<CardId>,
    shared: Arc<ReaderShared>,
}

impl MockProximityReaderHandle {
    /// Bring a card into the reader's field.
    ///
    /// # Errors
    /// Fails if the reader was dropped or too many presentations are pending.
    pub fn present_card(&self, card: CardId) -> Result<()> {
        self.card_tx.try_send(card).map_err(|e| match e {
            TrySendError::Full(_) => HardwareError::communication("presentation queue full"),
            TrySendError::Closed(_) => HardwareError::disconnected("mock reader dropped"),
        })
    }

    /// Simulate unplugging (or plugging back) the reader.
    pub fn set_connected(&self, connected: bool) {
        self.shared.connected.store(connected, Ordering::Release);
    }

    /// Number of times the reader was told to halt the current card.
    pub fn halt_count(&self) -> u64 {
        self.shared.halts.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(hex: &str) -> CardId {
        CardId::from_hex(hex).unwrap()
    }

    #[tokio::test]
    async fn test_each_presentation_reported_once() {
        let (mut reader, handle) = MockProximityReader::new();
        handle.present_card(card("04ABCDEF")).unwrap();

        assert_eq!(reader.poll_new_card().await.unwrap(), Some(card("04ABCDEF")));
        assert_eq!(reader.poll_new_card().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_presentations_keep_order() {
        let (mut reader, handle) = MockProximityReader::new();
        handle.present_card(card("01")).unwrap();
        handle.present_card(card("02")).unwrap();

        assert_eq!(reader.poll_new_card().await.unwrap(), Some(card("01")));
        assert_eq!(reader.poll_new_card().await.unwrap(), Some(card("02")));
    }

    #[tokio::test]
    async fn test_halt_is_counted() {
        let (mut reader, handle) = MockProximityReader::new();
        reader.halt().await.unwrap();
        reader.halt().await.unwrap();
        assert_eq!(handle.halt_count(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_reader_errors() {
        let (mut reader, handle) = MockProximityReader::new();
        handle.set_connected(false);

        assert!(reader.poll_new_card().await.unwrap_err().is_disconnected());
        assert!(reader.halt().await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_handle_closes_channel() {
        let (mut reader, handle) = MockProximityReader::new();
        drop(handle);
        assert!(reader.poll_new_card().await.is_err());
    }

    #[test]
    fn test_present_after_reader_dropped() {
        let (reader, handle) = MockProximityReader::new();
        drop(reader);
        assert!(handle.present_card(card("01")).unwrap_err().is_disconnected());
    }

    #[tokio::test]
    async fn test_reader_info() {
        let (reader, _handle) = MockProximityReader::new();
        let info = reader.get_reader_info().await.unwrap();
        assert_eq!(info.name, "Mock MFRC522");
        assert_eq!(info.protocols, vec!["ISO14443A".to_string()]);
    }
}
