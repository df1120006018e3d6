//! A channel that the engines can drain into a sequence and fill from one.
//!
//! Encoding a [`Chan`] receives whatever the channel holds, according to
//! [`Options::chan_recv_timeout`](crate::Options::chan_recv_timeout), and
//! writes it as an array. Decoding an array into a `Chan` sends each element.

use crate::options::ChanTimeout;
use crate::reflect::{ChanLike, Element, Reflect, ReflectMut, ReflectRef, TypeInfo, TypeRef, Typed};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Instant;

/// An unbounded channel holding both ends.
///
/// The channel is closed once [`close`](Chan::close) was called and every
/// sender handed out by [`sender`](Chan::sender) is dropped.
///
/// # Examples
///
/// ```rust
/// use polycodec::{to_vec, Chan, JsonHandle};
///
/// let chan = Chan::new();
/// let tx = chan.sender().unwrap();
/// tx.send(1_u32).unwrap();
/// tx.send(2_u32).unwrap();
///
/// let handle = JsonHandle::new();
/// assert_eq!(to_vec(&handle, &chan).unwrap(), b"[1,2]");
/// ```
pub struct Chan<T> {
    tx: Mutex<Option<Sender<T>>>,
    rx: Mutex<Receiver<T>>,
}

impl<T> Chan<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Chan {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    /// A new sending end; `None` once the channel is closed.
    pub fn sender(&self) -> Option<Sender<T>> {
        self.tx.lock().clone()
    }

    /// Drops the channel's own sender. Elements already sent stay receivable.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Receives without blocking.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.lock().try_recv().ok()
    }
}

impl<T> Default for Chan<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Chan<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chan").finish_non_exhaustive()
    }
}

fn drain_into<T>(rx: &Receiver<T>, timeout: ChanTimeout, out: &mut Vec<T>) {
    match timeout {
        ChanTimeout::Immediate => loop {
            match rx.try_recv() {
                Ok(v) => out.push(v),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        },
        ChanTimeout::UntilClosed => out.extend(rx.iter()),
        ChanTimeout::Duration(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                let left = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(left) {
                    Ok(v) => out.push(v),
                    Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
                }
            }
        }
    }
}

impl<T: Element> Typed for Chan<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::Chan(TypeRef::of::<T>())
    }
}

impl<T: Element> Reflect for Chan<T> {
    crate::__reflect_any_methods!();

    // Empties the channel.
    fn reset(&mut self) {
        let mut dropped = Vec::new();
        drain_into(&self.rx.lock(), ChanTimeout::Immediate, &mut dropped);
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Chan(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Chan(self)
    }
}

impl<T: Element> ChanLike for Chan<T> {
    fn drain(&self, timeout: ChanTimeout) -> Vec<Box<dyn Reflect>> {
        let mut items = Vec::new();
        drain_into(&self.rx.lock(), timeout, &mut items);
        items
            .into_iter()
            .map(|v| Box::new(v) as Box<dyn Reflect>)
            .collect()
    }

    fn new_elem(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }

    fn send(&mut self, elem: Box<dyn Reflect>) -> Result<()> {
        let elem = elem
            .into_any()
            .downcast::<T>()
            .map_err(|_| Error::custom("channel element of the wrong type"))?;
        match self.tx.lock().as_ref() {
            Some(tx) => tx
                .send(*elem)
                .map_err(|_| Error::custom("channel receiver is gone")),
            None => Err(Error::custom("send on a closed channel")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_immediate_drain_takes_pending_only() {
        let chan = Chan::new();
        let tx = chan.sender().unwrap();
        tx.send(1_i32).unwrap();
        tx.send(2_i32).unwrap();
        let items = chan.drain(ChanTimeout::Immediate);
        assert_eq!(items.len(), 2);
        assert!(chan.drain(ChanTimeout::Immediate).is_empty());
    }

    #[test]
    fn test_drain_until_closed() {
        let chan = Chan::new();
        let tx = chan.sender().unwrap();
        let producer = thread::spawn(move || {
            for i in 0..3_u16 {
                tx.send(i).unwrap();
            }
        });
        chan.close();
        let items = chan.drain(ChanTimeout::UntilClosed);
        producer.join().unwrap();
        assert_eq!(items.len(), 3);
        assert!(chan.sender().is_none());
    }

    #[test]
    fn test_bounded_drain_waits_for_late_sends() {
        let chan: Chan<i32> = Chan::new();
        let tx = chan.sender().unwrap();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(7).unwrap();
        });
        let items = chan.drain(ChanTimeout::Duration(Duration::from_millis(200)));
        producer.join().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].downcast_ref::<i32>(), Some(&7));
    }

    #[test]
    fn test_send_checks_element_type() {
        let mut chan: Chan<u8> = Chan::new();
        assert!(chan.send(Box::new(3_u8)).is_ok());
        assert!(chan.send(Box::new("no".to_string())).is_err());
        assert_eq!(chan.try_recv(), Some(3));
    }
}
