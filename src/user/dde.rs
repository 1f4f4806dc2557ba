// ── DDEML ─────────────────────────────────────────────────────────────────────
//
// Responsibilities in this file (unsafe confined here):
//   • `DdeInstance`: one `DdeInitializeW` registration per thread.
//   • `HSZ` string handles and `Conversation` client links, both borrowing
//     the instance so they are released before it.
//   • The `extern "system"` callback that turns DDEML transactions into
//     `DdeEvent`s for a Rust closure and its `DdeReply` back into a result.
//
// DDEML calls the callback on the thread that initialized the instance and
// passes no user data, so the closure lives in a thread-local slot.  The
// slot is taken out while the closure runs; a transaction that re-enters the
// callback during that time is answered as not processed.

#![allow(unsafe_code)]

use std::{
    cell::RefCell,
    ffi::c_void,
    marker::PhantomData,
    panic::{catch_unwind, AssertUnwindSafe},
};

use tracing::{debug, error, trace, warn};
use windows::Win32::System::DataExchange::{
    DdeAccessData, DdeClientTransaction, DdeConnect, DdeCreateDataHandle, DdeCreateStringHandleW,
    DdeDisconnect, DdeFreeDataHandle, DdeFreeStringHandle, DdeGetLastError, DdeInitializeW,
    DdeNameService, DdeQueryStringW, DdeUnaccessData, DdeUninitialize,
    DDE_CLIENT_TRANSACTION_TYPE, DDE_INITIALIZE_COMMAND, DDE_NAME_SERVICE_CMD, HCONV, HDDEDATA,
    HSZ as RawHsz,
};

use crate::{
    error::{Error, Result},
    handle::Timeout,
    marshal::WString,
};

// ── Constants ─────────────────────────────────────────────────────────────────

const CP_WINUNICODE: i32 = 1200;
/// Clipboard format for 8-bit text.
pub const CF_TEXT: u32 = 1;

const DMLERR_NO_ERROR: u32 = 0;

const APPCLASS_STANDARD: u32 = 0x0000_0000;
const APPCMD_CLIENTONLY: u32 = 0x0000_0010;
const CBF_SKIP_REGISTRATIONS: u32 = 0x0008_0000;
const CBF_SKIP_UNREGISTRATIONS: u32 = 0x0010_0000;

const DNS_REGISTER: u32 = 0x0001;
const DNS_UNREGISTER: u32 = 0x0002;

const XCLASS_BOOL: u32 = 0x1000;
const XCLASS_DATA: u32 = 0x2000;
const XCLASS_FLAGS: u32 = 0x4000;
const XCLASS_NOTIFICATION: u32 = 0x8000;
const XCLASS_MASK: u32 = 0xFC00;
const XTYPF_NOBLOCK: u32 = 0x0002;

const XTYP_CONNECT: u32 = 0x0060 | XCLASS_BOOL | XTYPF_NOBLOCK;
const XTYP_EXECUTE: u32 = 0x0050 | XCLASS_FLAGS;
const XTYP_POKE: u32 = 0x0090 | XCLASS_FLAGS;
const XTYP_REQUEST: u32 = 0x00B0 | XCLASS_DATA;
const XTYP_DISCONNECT: u32 = 0x00C0 | XCLASS_NOTIFICATION | XTYPF_NOBLOCK;

const DDE_FACK: usize = 0x8000;
const DDE_FNOTPROCESSED: usize = 0x0000;

// ── Events ────────────────────────────────────────────────────────────────────

/// A transaction delivered to a server callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdeEvent {
    /// A client asks to open a conversation on `topic`.
    Connect { topic: String, service: String },
    Execute { topic: String, command: String },
    Request { topic: String, item: String },
    Poke { topic: String, item: String, data: Vec<u8> },
    Disconnect,
    /// Any other `XTYP_*` value.
    Other(u32),
}

/// The server's answer to a [`DdeEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdeReply {
    /// Execute or poke handled.
    Ack,
    NotProcessed,
    /// Request answered with these bytes.
    Data(Vec<u8>),
    /// Connect accepted.
    Accept,
    Reject,
}

/// Callback result for transactions that carry no data: the `XCLASS_BOOL`
/// and `XCLASS_FLAGS` classes.  `None` for the data and notification
/// classes.
fn flag_reply(wtype: u32, reply: &DdeReply) -> Option<usize> {
    match wtype & XCLASS_MASK {
        XCLASS_BOOL => Some(matches!(reply, DdeReply::Accept | DdeReply::Ack) as usize),
        XCLASS_FLAGS => Some(match reply {
            DdeReply::Ack | DdeReply::Accept => DDE_FACK,
            _ => DDE_FNOTPROCESSED,
        }),
        _ => None,
    }
}

/// Decode little-endian UTF-16 bytes up to the first NUL.
fn utf16_from_bytes(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Bytes up to the first NUL, decoded lossily.
fn text_from_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// DDEML has no infinite synchronous timeout: `u32::MAX` selects an
/// asynchronous transaction.
fn transaction_timeout(t: Timeout) -> u32 {
    t.as_millis().min(u32::MAX - 1)
}

// ── Thread-local slot ─────────────────────────────────────────────────────────

type Callback = Box<dyn FnMut(DdeEvent) -> DdeReply>;

struct Slot {
    inst: u32,
    callback: Option<Callback>,
}

thread_local! {
    static SLOT: RefCell<Option<Slot>> = const { RefCell::new(None) };
}

unsafe extern "system" fn dde_callback(
    wtype: u32,
    wfmt: u32,
    _hconv: HCONV,
    hsz1: RawHsz,
    hsz2: RawHsz,
    hdata: HDDEDATA,
    _data1: usize,
    _data2: usize,
) -> HDDEDATA {
    let taken = SLOT.with(|s| {
        s.borrow_mut()
            .as_mut()
            .map(|slot| (slot.inst, slot.callback.take()))
    });
    let Some((inst, Some(mut callback))) = taken else {
        return HDDEDATA::default();
    };

    // SAFETY: DDEML hands the callback string and data handles that are
    // valid for the duration of the call, on the instance's own thread.
    let event = unsafe { decode_event(inst, wtype, hsz1, hsz2, hdata) };
    let reply = catch_unwind(AssertUnwindSafe(|| callback(event)));

    SLOT.with(|s| {
        if let Some(slot) = s.borrow_mut().as_mut() {
            slot.callback = Some(callback);
        }
    });

    let reply = match reply {
        Ok(reply) => reply,
        Err(_) => {
            error!(wtype, "DDE callback panicked; transaction not processed");
            DdeReply::NotProcessed
        }
    };

    if let Some(v) = flag_reply(wtype, &reply) {
        return HDDEDATA(v as *mut c_void);
    }
    match (wtype, reply) {
        (XTYP_REQUEST, DdeReply::Data(bytes)) => {
            // SAFETY: `bytes` is copied into a DDEML-owned handle, which the
            // system frees after delivering it to the client.
            unsafe { DdeCreateDataHandle(inst, Some(&bytes), 0, hsz2, wfmt, 0) }
        }
        _ => HDDEDATA::default(),
    }
}

/// # Safety
/// The handles must be live for `inst`, as during a DDEML callback.
unsafe fn decode_event(inst: u32, wtype: u32, hsz1: RawHsz, hsz2: RawHsz, hdata: HDDEDATA) -> DdeEvent {
    // SAFETY: forwarded from the caller.
    let query = |h: RawHsz| unsafe { query_string(inst, h) }.unwrap_or_default();
    match wtype {
        XTYP_CONNECT => DdeEvent::Connect {
            topic: query(hsz1),
            service: query(hsz2),
        },
        XTYP_EXECUTE => DdeEvent::Execute {
            topic: query(hsz1),
            // SAFETY: as above.
            command: utf16_from_bytes(&unsafe { read_data(hdata) }.unwrap_or_default()),
        },
        XTYP_REQUEST => DdeEvent::Request {
            topic: query(hsz1),
            item: query(hsz2),
        },
        XTYP_POKE => DdeEvent::Poke {
            topic: query(hsz1),
            item: query(hsz2),
            // SAFETY: as above.
            data: unsafe { read_data(hdata) }.unwrap_or_default(),
        },
        XTYP_DISCONNECT => DdeEvent::Disconnect,
        other => DdeEvent::Other(other),
    }
}

/// # Safety
/// `h` must be a string handle live for `inst`.
unsafe fn query_string(inst: u32, h: RawHsz) -> Result<String> {
    if h.0.is_null() {
        return Ok(String::new());
    }
    // SAFETY: a NULL buffer only reports the length, terminator excluded.
    let len = unsafe { DdeQueryStringW(inst, h, None, CP_WINUNICODE) } as usize;
    if len == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u16; len + 1];
    // SAFETY: the slice carries its length, which fits the string and its
    // terminator.
    let n = unsafe { DdeQueryStringW(inst, h, Some(&mut buf), CP_WINUNICODE) } as usize;
    if n == 0 {
        return Err(dde_error(inst, "DdeQueryStringW"));
    }
    Ok(String::from_utf16_lossy(&buf[..n.min(len)]))
}

/// Copy a data handle's contents.
///
/// # Safety
/// `h` must be NULL or a live data handle.
unsafe fn read_data(h: HDDEDATA) -> Option<Vec<u8>> {
    if h.0.is_null() {
        return None;
    }
    let mut len = 0u32;
    // SAFETY: `len` is a valid out-pointer; the returned pointer covers
    // `len` bytes until DdeUnaccessData.
    let p = unsafe { DdeAccessData(h, Some(&mut len as *mut u32)) };
    if p.is_null() {
        return None;
    }
    // SAFETY: as above.
    let bytes = unsafe { std::slice::from_raw_parts(p, len as usize) }.to_vec();
    // SAFETY: balances the DdeAccessData above.
    unsafe {
        let _ = DdeUnaccessData(h);
    }
    Some(bytes)
}

fn dde_error(inst: u32, function: &'static str) -> Error {
    // SAFETY: plain value argument; reading also clears the error.
    let code = unsafe { DdeGetLastError(inst) };
    Error::Dde { function, code }
}

// ── DdeInstance ───────────────────────────────────────────────────────────────

/// A DDEML registration, tied to the thread that created it.
pub struct DdeInstance {
    id: u32,
    services: RefCell<Vec<RawHsz>>,
    _not_send: PhantomData<*const ()>,
}

impl std::fmt::Debug for DdeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdeInstance").field("id", &self.id).finish()
    }
}

impl DdeInstance {
    /// A client-only instance (`APPCMD_CLIENTONLY`).
    pub fn client() -> Result<Self> {
        Self::init(None, APPCMD_CLIENTONLY)
    }

    /// A server instance whose transactions are handled by `callback`.
    /// Callbacks arrive while this thread pumps messages.
    pub fn server<F>(callback: F) -> Result<Self>
    where
        F: FnMut(DdeEvent) -> DdeReply + 'static,
    {
        Self::init(
            Some(Box::new(callback)),
            APPCLASS_STANDARD | CBF_SKIP_REGISTRATIONS | CBF_SKIP_UNREGISTRATIONS,
        )
    }

    fn init(callback: Option<Callback>, flags: u32) -> Result<Self> {
        SLOT.with(|s| {
            let mut slot = s.borrow_mut();
            if slot.is_some() {
                return Err(Error::Unsupported("a DDE instance already exists on this thread"));
            }
            *slot = Some(Slot { inst: 0, callback });
            Ok(())
        })?;

        let mut id = 0u32;
        // SAFETY: `id` is a valid out-pointer and the callback is a
        // `'static` function.
        let code = unsafe { DdeInitializeW(&mut id, Some(dde_callback), DDE_INITIALIZE_COMMAND(flags), 0) };
        if code != DMLERR_NO_ERROR {
            SLOT.with(|s| *s.borrow_mut() = None);
            return Err(Error::Dde {
                function: "DdeInitializeW",
                code,
            });
        }
        SLOT.with(|s| {
            if let Some(slot) = s.borrow_mut().as_mut() {
                slot.inst = id;
            }
        });
        trace!(id, flags, "initialized DDE instance");
        Ok(Self {
            id,
            services: RefCell::new(Vec::new()),
            _not_send: PhantomData,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn error(&self, function: &'static str) -> Error {
        dde_error(self.id, function)
    }

    /// `DdeCreateStringHandleW`; freed when the returned handle drops.
    pub fn string(&self, s: &str) -> Result<HSZ<'_>> {
        let ws = WString::new(s)?;
        // SAFETY: ws is NUL-terminated; the handle belongs to this instance.
        let raw = unsafe { DdeCreateStringHandleW(self.id, ws.as_pcwstr(), CP_WINUNICODE) };
        if raw.0.is_null() {
            return Err(self.error("DdeCreateStringHandleW"));
        }
        Ok(HSZ { inst: self, raw })
    }

    /// Open a client conversation with `service` on `topic`.
    pub fn connect(&self, service: &str, topic: &str) -> Result<Conversation<'_>> {
        let hservice = self.string(service)?;
        let htopic = self.string(topic)?;
        // SAFETY: both string handles are live for this instance; default
        // conversation context.
        let raw = unsafe { DdeConnect(self.id, hservice.raw, htopic.raw, None) };
        if raw.0.is_null() {
            return Err(self.error("DdeConnect"));
        }
        debug!(service, topic, "DDE conversation opened");
        Ok(Conversation { inst: self, raw })
    }

    /// Advertise `name` so clients can connect to it.
    pub fn register_service(&self, name: &str) -> Result<()> {
        let hsz = self.string(name)?;
        // SAFETY: the service handle is live; hsz2 is reserved.
        let r = unsafe { DdeNameService(self.id, hsz.raw, RawHsz::default(), DDE_NAME_SERVICE_CMD(DNS_REGISTER)) };
        if r.0.is_null() {
            return Err(self.error("DdeNameService"));
        }
        // The name must outlive its registration; it is freed on drop.
        self.services.borrow_mut().push(hsz.into_raw());
        debug!(service = name, "registered DDE service");
        Ok(())
    }
}

impl Drop for DdeInstance {
    fn drop(&mut self) {
        let services = std::mem::take(self.services.get_mut());
        if !services.is_empty() {
            // SAFETY: a NULL service with DNS_UNREGISTER drops every name
            // this instance registered.
            unsafe {
                let _ = DdeNameService(self.id, RawHsz::default(), RawHsz::default(), DDE_NAME_SERVICE_CMD(DNS_UNREGISTER));
            }
        }
        for hsz in services {
            // SAFETY: each handle was created by this instance and is freed
            // once.
            unsafe {
                let _ = DdeFreeStringHandle(self.id, hsz);
            }
        }
        // SAFETY: every HSZ and Conversation borrowed `self` and is gone.
        if !unsafe { DdeUninitialize(self.id) }.as_bool() {
            warn!(id = self.id, "DdeUninitialize failed");
        }
        SLOT.with(|s| *s.borrow_mut() = None);
        trace!(id = self.id, "uninitialized DDE instance");
    }
}

// ── HSZ ───────────────────────────────────────────────────────────────────────

/// A DDEML string handle owned by one instance.
#[derive(Debug)]
pub struct HSZ<'i> {
    inst: &'i DdeInstance,
    raw: RawHsz,
}

impl HSZ<'_> {
    pub fn raw(&self) -> RawHsz {
        self.raw
    }

    pub fn query(&self) -> Result<String> {
        // SAFETY: the handle is live for the borrowed instance.
        unsafe { query_string(self.inst.id, self.raw) }
    }

    /// Give up ownership; the caller frees the handle.
    fn into_raw(self) -> RawHsz {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }
}

impl Drop for HSZ<'_> {
    fn drop(&mut self) {
        // SAFETY: created by this instance and freed exactly once.
        if !unsafe { DdeFreeStringHandle(self.inst.id, self.raw) }.as_bool() {
            warn!("DdeFreeStringHandle failed");
        }
    }
}

// ── Conversation ──────────────────────────────────────────────────────────────

/// A client conversation; disconnected on drop.
#[derive(Debug)]
pub struct Conversation<'i> {
    inst: &'i DdeInstance,
    raw: HCONV,
}

impl Conversation<'_> {
    fn transact(
        &self,
        function: &'static str,
        data: Option<&[u8]>,
        item: Option<&HSZ<'_>>,
        format: u32,
        wtype: u32,
        timeout: Timeout,
    ) -> Result<HDDEDATA> {
        let (ptr, len) = match data {
            Some(d) => (Some(d.as_ptr()), d.len() as u32),
            None => (None, 0),
        };
        // SAFETY: `data` outlives the synchronous transaction; the item
        // handle, if any, belongs to this instance.
        let r = unsafe {
            DdeClientTransaction(
                ptr,
                len,
                self.raw,
                item.map_or(RawHsz::default(), HSZ::raw),
                format,
                DDE_CLIENT_TRANSACTION_TYPE(wtype),
                transaction_timeout(timeout),
                None,
            )
        };
        if r.0.is_null() {
            return Err(self.inst.error(function));
        }
        Ok(r)
    }

    /// Send an `XTYP_EXECUTE` command string.
    pub fn execute(&self, command: &str, timeout: Timeout) -> Result<()> {
        let wcommand = WString::new(command)?;
        let bytes: Vec<u8> = wcommand
            .as_slice_with_nul()
            .iter()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        self.transact("DdeClientTransaction", Some(&bytes), None, 0, XTYP_EXECUTE, timeout)?;
        Ok(())
    }

    /// Request `item` as `CF_TEXT`; returns the raw bytes.
    pub fn request(&self, item: &str, timeout: Timeout) -> Result<Vec<u8>> {
        let hitem = self.inst.string(item)?;
        let h = self.transact("DdeClientTransaction", None, Some(&hitem), CF_TEXT, XTYP_REQUEST, timeout)?;
        // SAFETY: a request returns a data handle the client must free.
        let bytes = unsafe { read_data(h) };
        // SAFETY: as above; freed once.
        unsafe {
            let _ = DdeFreeDataHandle(h);
        }
        bytes.ok_or_else(|| self.inst.error("DdeAccessData"))
    }

    /// Request `item` as text, stopping at the first NUL.
    pub fn request_text(&self, item: &str) -> Result<String> {
        self.request(item, Timeout::Millis(5_000))
            .map(|b| text_from_bytes(&b))
    }

    /// Send `data` to `item` (`XTYP_POKE`, `CF_TEXT`).
    pub fn poke(&self, item: &str, data: &[u8], timeout: Timeout) -> Result<()> {
        let hitem = self.inst.string(item)?;
        self.transact("DdeClientTransaction", Some(data), Some(&hitem), CF_TEXT, XTYP_POKE, timeout)?;
        Ok(())
    }
}

impl Drop for Conversation<'_> {
    fn drop(&mut self) {
        // SAFETY: the conversation handle is disconnected once.
        if unsafe { DdeDisconnect(self.raw) }.as_bool() {
            debug!("DDE conversation closed");
        } else {
            warn!("DdeDisconnect failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::user::window;

    #[test]
    fn flag_replies_follow_the_transaction_class() {
        assert_eq!(flag_reply(XTYP_CONNECT, &DdeReply::Accept), Some(1));
        assert_eq!(flag_reply(XTYP_CONNECT, &DdeReply::Reject), Some(0));
        assert_eq!(flag_reply(XTYP_EXECUTE, &DdeReply::Ack), Some(DDE_FACK));
        assert_eq!(flag_reply(XTYP_POKE, &DdeReply::NotProcessed), Some(DDE_FNOTPROCESSED));
        assert_eq!(flag_reply(XTYP_REQUEST, &DdeReply::Data(vec![1])), None);
        assert_eq!(flag_reply(XTYP_DISCONNECT, &DdeReply::Ack), None);
    }

    #[test]
    fn byte_decoders_stop_at_nul() {
        let wide: Vec<u8> = "open\0x".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(utf16_from_bytes(&wide), "open");
        assert_eq!(text_from_bytes(b"abc\0def"), "abc");
        assert_eq!(text_from_bytes(b"abc"), "abc");
    }

    #[test]
    fn infinite_timeout_stays_synchronous() {
        assert_eq!(transaction_timeout(Timeout::Infinite), u32::MAX - 1);
        assert_eq!(transaction_timeout(Timeout::Millis(250)), 250);
    }

    #[test]
    fn one_instance_per_thread() {
        let first = DdeInstance::client().unwrap();
        assert!(matches!(DdeInstance::client(), Err(Error::Unsupported(_))));
        drop(first);
        // The slot is free again once the first instance is gone.
        let _again = DdeInstance::client().unwrap();
    }

    #[test]
    fn string_handles_round_trip() {
        let inst = DdeInstance::client().unwrap();
        let hsz = inst.string("Topic \u{00E9}").unwrap();
        assert_eq!(hsz.query().unwrap(), "Topic \u{00E9}");
        assert!(matches!(inst.string("a\0b"), Err(Error::InteriorNul { position: 1 })));
    }

    #[test]
    fn connecting_to_nothing_reports_the_dde_error() {
        let inst = DdeInstance::client().unwrap();
        let err = inst.connect("WinhandleNoSuchService", "none").unwrap_err();
        // DMLERR_NO_CONV_ESTABLISHED
        assert!(matches!(err, Error::Dde { code: 0x400a, .. }), "{err}");
    }

    #[test]
    fn client_talks_to_a_server_thread() {
        let service = format!("WinhandleTest{}", std::process::id());
        let (ready_tx, ready_rx) = mpsc::channel();
        let server_service = service.clone();
        let server = std::thread::spawn(move || {
            let inst = DdeInstance::server(|event| match event {
                DdeEvent::Connect { topic, .. } if topic == "status" => DdeReply::Accept,
                DdeEvent::Connect { .. } => DdeReply::Reject,
                DdeEvent::Execute { command, .. } if command == "quit" => {
                    window::post_quit(0);
                    DdeReply::Ack
                }
                DdeEvent::Request { item, .. } => DdeReply::Data(format!("value of {item}\0").into_bytes()),
                DdeEvent::Poke { data, .. } if data.starts_with(b"ok") => DdeReply::Ack,
                _ => DdeReply::NotProcessed,
            })
            .unwrap();
            inst.register_service(&server_service).unwrap();
            ready_tx.send(()).unwrap();
            window::pump_messages().unwrap();
        });
        ready_rx.recv().unwrap();

        let client = DdeInstance::client().unwrap();
        assert!(client.connect(&service, "other").is_err());
        let conv = client.connect(&service, "status").unwrap();
        assert_eq!(conv.request_text("color").unwrap(), "value of color");
        conv.poke("color", b"ok\0", Timeout::Millis(5_000)).unwrap();
        let err = conv.execute("unknown", Timeout::Millis(5_000)).unwrap_err();
        // DMLERR_NOTPROCESSED
        assert!(matches!(err, Error::Dde { code: 0x4009, .. }), "{err}");
        conv.execute("quit", Timeout::Millis(5_000)).unwrap();
        drop(conv);
        server.join().unwrap();
    }

    #[test]
    fn panicking_callback_reports_not_processed() {
        let service = format!("WinhandlePanic{}", std::process::id());
        let (ready_tx, ready_rx) = mpsc::channel();
        let server_service = service.clone();
        let server = std::thread::spawn(move || {
            let inst = DdeInstance::server(|event| match event {
                DdeEvent::Connect { .. } => DdeReply::Accept,
                DdeEvent::Execute { command, .. } if command == "quit" => {
                    window::post_quit(0);
                    DdeReply::Ack
                }
                DdeEvent::Execute { command, .. } => panic!("cannot run {command}"),
                _ => DdeReply::NotProcessed,
            })
            .unwrap();
            inst.register_service(&server_service).unwrap();
            ready_tx.send(()).unwrap();
            window::pump_messages().unwrap();
        });
        ready_rx.recv().unwrap();

        let client = DdeInstance::client().unwrap();
        let conv = client.connect(&service, "jobs").unwrap();
        let err = conv.execute("explode", Timeout::Millis(5_000)).unwrap_err();
        // DMLERR_NOTPROCESSED
        assert!(matches!(err, Error::Dde { code: 0x4009, .. }), "{err}");

        // The callback is still installed after the panic.
        conv.execute("quit", Timeout::Millis(5_000)).unwrap();
        drop(conv);
        server.join().unwrap();
    }
}
