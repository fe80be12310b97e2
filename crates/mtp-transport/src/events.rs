//! Event delivery (`spec.md` §4.3 "Events").
//!
//! Events are Response-shaped containers, always carrying exactly three
//! parameters, read from the interrupt IN endpoint. They must never
//! interleave with Command/Data/Response framing on the bulk endpoints,
//! so the async mode here is deliberately given its own narrow capability
//! ([`InterruptSource`]) rather than a handle to the full [`crate::UsbTransport`].

use std::thread::JoinHandle;
use std::time::Duration;

use mtp_dtyp::MtpError;
use mtp_msg::{ContainerHeader, ContainerKind, HEADER_LEN};

/// A decoded event container: code plus its three parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpEvent {
    pub code: u16,
    pub transaction_id: u32,
    pub params: [u32; 3],
}

impl PtpEvent {
    /// Parses one interrupt IN transfer as an event container.
    pub fn from_bytes(bytes: &[u8]) -> mtp_dtyp::Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(MtpError::protocol("event transfer shorter than header"));
        }
        let header = ContainerHeader::from_bytes(bytes[0..HEADER_LEN].try_into().unwrap())
            .ok_or_else(|| MtpError::protocol("event container has unknown type"))?;
        if header.kind != ContainerKind::Event {
            return Err(MtpError::protocol("interrupt transfer was not an event"));
        }
        let mut params = [0u32; 3];
        for (i, p) in params.iter_mut().enumerate() {
            let off = HEADER_LEN + i * 4;
            if bytes.len() >= off + 4 {
                *p = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
            }
        }
        Ok(PtpEvent {
            code: header.code,
            transaction_id: header.transaction_id,
            params,
        })
    }
}

/// The terminal outcome of one asynchronously-delivered interrupt
/// transfer (`spec.md` §4.3 "Async" event mode).
#[derive(Debug)]
pub enum EventOutcome {
    Event(PtpEvent),
    Timeout,
    Cancelled,
    /// The interrupt transfer completed but didn't decode as an event.
    DataExpected,
    Io(String),
}

/// The minimal capability an async event listener needs: one endpoint,
/// not the whole device. A real backend typically hands out a cheap
/// handle to the same interrupt endpoint a [`crate::UsbTransport`] uses
/// for `interrupt_in`, so the listener thread can block without holding
/// the bulk endpoints' exclusive access hostage.
pub trait InterruptSource: Send + 'static {
    fn interrupt_in(&mut self, buf: &mut [u8], timeout: Duration) -> mtp_dtyp::Result<usize>;
}

/// Registers a one-shot async event listener: spawns a thread that blocks
/// on a single interrupt transfer and invokes `callback` with the result.
///
/// `spec.md` is explicit that event delivery must not interleave with
/// transaction framing on the bulk endpoints — callers must pass an
/// `InterruptSource` that does not also drive bulk transfers.
pub fn register_async_event<I, F>(
    mut source: I,
    timeout: Duration,
    mut callback: F,
) -> JoinHandle<()>
where
    I: InterruptSource,
    F: FnMut(EventOutcome) + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = [0u8; 64];
        let outcome = match source.interrupt_in(&mut buf, timeout) {
            Ok(n) => match PtpEvent::from_bytes(&buf[..n]) {
                Ok(ev) => EventOutcome::Event(ev),
                Err(_) => EventOutcome::DataExpected,
            },
            Err(MtpError::Timeout) => EventOutcome::Timeout,
            Err(MtpError::Cancelled) => EventOutcome::Cancelled,
            Err(e) => EventOutcome::Io(e.to_string()),
        };
        callback(outcome);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtp_msg::ParamContainer;
    use std::sync::mpsc;

    struct OnceSource(Option<Vec<u8>>);

    impl InterruptSource for OnceSource {
        fn interrupt_in(&mut self, buf: &mut [u8], _timeout: Duration) -> mtp_dtyp::Result<usize> {
            match self.0.take() {
                Some(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                None => Err(MtpError::Timeout),
            }
        }
    }

    #[test]
    fn parses_well_formed_event() {
        let c = ParamContainer::new(ContainerKind::Event, 0x4002, 5, &[1, 2, 3]);
        let ev = PtpEvent::from_bytes(&c.to_bytes()).unwrap();
        assert_eq!(ev.code, 0x4002);
        assert_eq!(ev.transaction_id, 5);
        assert_eq!(ev.params, [1, 2, 3]);
    }

    #[test]
    fn rejects_non_event_container() {
        let c = ParamContainer::new(ContainerKind::Response, 0x2001, 0, &[]);
        assert!(PtpEvent::from_bytes(&c.to_bytes()).is_err());
    }

    #[test]
    fn async_registration_delivers_outcome() {
        let c = ParamContainer::new(ContainerKind::Event, 0x4002, 1, &[9, 0, 0]);
        let source = OnceSource(Some(c.to_bytes()));
        let (tx, rx) = mpsc::channel();
        let handle = register_async_event(source, Duration::from_millis(50), move |outcome| {
            tx.send(outcome).unwrap();
        });
        handle.join().unwrap();
        match rx.recv().unwrap() {
            EventOutcome::Event(ev) => assert_eq!(ev.code, 0x4002),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
