use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Callsign portion of an address subfield, in octets.
pub(crate) const CALL_LEN: usize = 6;
/// Full address subfield including the SSID octet.
pub(crate) const ADDR_LEN: usize = 7;
/// AX.25 permits at most eight digipeaters in the address field.
pub const MAX_DIGIPEATERS: usize = 8;
/// PID indicating there is no layer 3 protocol.
pub const PID_NO_LAYER3: u8 = 0xF0;

// SSID octet layout: C | R | R | SSID | E
const HDLC_EXTENSION: u8 = 0b0000_0001;
const SSID_MASK: u8 = 0b0001_1110;
const C_BIT: u8 = 0b1000_0000;
// The two reserved bits are transmitted as ones per v2.2; either value
// must be accepted on receive.
const RESERVED_BITS: u8 = 0b0110_0000;

// Poll/final bit within the control octet
const PF: u8 = 0b0001_0000;

/// Errors when parsing a callsign-SSID string into an `Address`
#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("Callsign must be 1 to 6 letters and digits. Example: VK7NTK-0")]
    InvalidCallsign,
    #[error("Could not parse SSID: {}", source)]
    InvalidSsid { source: std::num::ParseIntError },
    #[error("SSID must be between 0 and 15")]
    SsidOutOfRange,
}

/// Errors when parsing a byte buffer into an `Ax25Frame`
#[derive(Debug, Error)]
pub enum FrameParseError {
    #[error("Address subfield does not contain a valid callsign")]
    InvalidAddress,
    #[error("Unrecognised control field: {:#04x}", control)]
    InvalidControl { control: u8 },
    #[error("Frame ends before it is structurally complete: len {}", len)]
    TruncatedFrame { len: usize },
    #[error("Frame lists {} repeaters where at most {} are allowed", count, MAX_DIGIPEATERS)]
    TooManyRepeaters { count: usize },
    #[error("{} bytes follow a frame type that carries no information field", len)]
    UnexpectedTrailer { len: usize },
}

/// The specific kind of frame identified by the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Information,
    ReceiveReady,
    ReceiveNotReady,
    Reject,
    SelectiveReject,
    SetAsynchronousBalancedMode,
    Disconnect,
    DisconnectedMode,
    UnnumberedAcknowledge,
    FrameReject,
    UnnumberedInformation,
    ExchangeIdentification,
    Test,
}

impl FrameType {
    /// Is this the numbered information transfer frame?
    pub fn is_information(self) -> bool {
        matches!(self, FrameType::Information)
    }

    /// Is this one of the supervisory (S) frame types?
    pub fn is_supervisory(self) -> bool {
        matches!(
            self,
            FrameType::ReceiveReady
                | FrameType::ReceiveNotReady
                | FrameType::Reject
                | FrameType::SelectiveReject
        )
    }

    /// Is this one of the unnumbered (U) frame types?
    pub fn is_unnumbered(self) -> bool {
        matches!(
            self,
            FrameType::SetAsynchronousBalancedMode
                | FrameType::Disconnect
                | FrameType::DisconnectedMode
                | FrameType::UnnumberedAcknowledge
                | FrameType::FrameReject
                | FrameType::UnnumberedInformation
                | FrameType::ExchangeIdentification
                | FrameType::Test
        )
    }

    /// I and UI frames carry a PID octet followed by the information field.
    pub fn has_pid(self) -> bool {
        matches!(
            self,
            FrameType::Information | FrameType::UnnumberedInformation
        )
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FrameType::Information => "I",
            FrameType::ReceiveReady => "RR",
            FrameType::ReceiveNotReady => "RNR",
            FrameType::Reject => "REJ",
            FrameType::SelectiveReject => "SREJ",
            FrameType::SetAsynchronousBalancedMode => "SABM",
            FrameType::Disconnect => "DISC",
            FrameType::DisconnectedMode => "DM",
            FrameType::UnnumberedAcknowledge => "UA",
            FrameType::FrameReject => "FRMR",
            FrameType::UnnumberedInformation => "UI",
            FrameType::ExchangeIdentification => "XID",
            FrameType::Test => "TEST",
        };
        write!(f, "{}", name)
    }
}

/// Supervisory frame variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisoryKind {
    ReceiveReady,
    ReceiveNotReady,
    Reject,
    SelectiveReject,
}

/// Unnumbered frame variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnnumberedKind {
    SetAsynchronousBalancedMode,
    Disconnect,
    DisconnectedMode,
    UnnumberedAcknowledge,
    FrameReject,
    UnnumberedInformation,
    ExchangeIdentification,
    Test,
}

/// The control field of a frame: one octet in modulo-8 operation.
///
/// Each family carries exactly the sub-fields the protocol assigns to it.
/// Sequence numbers are modulo 8; values above 7 are masked on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Numbered information transfer (I frame)
    Information {
        recv_seqno: u8,
        send_seqno: u8,
        poll: bool,
    },
    /// Flow and error control (S frame)
    Supervisory {
        kind: SupervisoryKind,
        recv_seqno: u8,
        poll_final: bool,
    },
    /// Link management (U frame)
    Unnumbered {
        kind: UnnumberedKind,
        poll_final: bool,
    },
}

impl Control {
    /// Decode a control octet.
    ///
    /// The low bit selects the I family and the low two bits the S and U
    /// families. SABME (0x6F) requests modulo-128 operation, which is not
    /// supported, so it is rejected along with the other unknown U types.
    pub fn from_byte(c: u8) -> Result<Control, FrameParseError> {
        if c & 0b0000_0001 == 0 {
            return Ok(Control::Information {
                recv_seqno: (c & 0b1110_0000) >> 5,
                send_seqno: (c & 0b0000_1110) >> 1,
                poll: c & PF > 0,
            });
        }
        if c & 0b0000_0011 == 0b0000_0001 {
            let kind = match c & 0b0000_1100 {
                0b0000_0000 => SupervisoryKind::ReceiveReady,
                0b0000_0100 => SupervisoryKind::ReceiveNotReady,
                0b0000_1000 => SupervisoryKind::Reject,
                _ => SupervisoryKind::SelectiveReject,
            };
            return Ok(Control::Supervisory {
                kind,
                recv_seqno: (c & 0b1110_0000) >> 5,
                poll_final: c & PF > 0,
            });
        }
        // The five modifier bits of a U frame sit either side of P/F
        let kind = match c & !PF {
            0b0010_1111 => UnnumberedKind::SetAsynchronousBalancedMode,
            0b0100_0011 => UnnumberedKind::Disconnect,
            0b0000_1111 => UnnumberedKind::DisconnectedMode,
            0b0110_0011 => UnnumberedKind::UnnumberedAcknowledge,
            0b1000_0111 => UnnumberedKind::FrameReject,
            0b0000_0011 => UnnumberedKind::UnnumberedInformation,
            0b1010_1111 => UnnumberedKind::ExchangeIdentification,
            0b1110_0011 => UnnumberedKind::Test,
            _ => return Err(FrameParseError::InvalidControl { control: c }),
        };
        Ok(Control::Unnumbered {
            kind,
            poll_final: c & PF > 0,
        })
    }

    /// Encode as a control octet.
    pub fn to_byte(&self) -> u8 {
        match *self {
            Control::Information {
                recv_seqno,
                send_seqno,
                poll,
            } => {
                let mut c = (recv_seqno & 0b0000_0111) << 5;
                if poll {
                    c |= PF;
                }
                c | (send_seqno & 0b0000_0111) << 1
            }
            Control::Supervisory {
                kind,
                recv_seqno,
                poll_final,
            } => {
                let mut c = match kind {
                    SupervisoryKind::ReceiveReady => 0b0000_0001,
                    SupervisoryKind::ReceiveNotReady => 0b0000_0101,
                    SupervisoryKind::Reject => 0b0000_1001,
                    SupervisoryKind::SelectiveReject => 0b0000_1101,
                };
                if poll_final {
                    c |= PF;
                }
                c | (recv_seqno & 0b0000_0111) << 5
            }
            Control::Unnumbered { kind, poll_final } => {
                let mut c = match kind {
                    UnnumberedKind::SetAsynchronousBalancedMode => 0b0010_1111,
                    UnnumberedKind::Disconnect => 0b0100_0011,
                    UnnumberedKind::DisconnectedMode => 0b0000_1111,
                    UnnumberedKind::UnnumberedAcknowledge => 0b0110_0011,
                    UnnumberedKind::FrameReject => 0b1000_0111,
                    UnnumberedKind::UnnumberedInformation => 0b0000_0011,
                    UnnumberedKind::ExchangeIdentification => 0b1010_1111,
                    UnnumberedKind::Test => 0b1110_0011,
                };
                if poll_final {
                    c |= PF;
                }
                c
            }
        }
    }

    /// The specific frame kind this control field identifies.
    pub fn frame_type(&self) -> FrameType {
        match *self {
            Control::Information { .. } => FrameType::Information,
            Control::Supervisory { kind, .. } => match kind {
                SupervisoryKind::ReceiveReady => FrameType::ReceiveReady,
                SupervisoryKind::ReceiveNotReady => FrameType::ReceiveNotReady,
                SupervisoryKind::Reject => FrameType::Reject,
                SupervisoryKind::SelectiveReject => FrameType::SelectiveReject,
            },
            Control::Unnumbered { kind, .. } => match kind {
                UnnumberedKind::SetAsynchronousBalancedMode => {
                    FrameType::SetAsynchronousBalancedMode
                }
                UnnumberedKind::Disconnect => FrameType::Disconnect,
                UnnumberedKind::DisconnectedMode => FrameType::DisconnectedMode,
                UnnumberedKind::UnnumberedAcknowledge => FrameType::UnnumberedAcknowledge,
                UnnumberedKind::FrameReject => FrameType::FrameReject,
                UnnumberedKind::UnnumberedInformation => FrameType::UnnumberedInformation,
                UnnumberedKind::ExchangeIdentification => FrameType::ExchangeIdentification,
                UnnumberedKind::Test => FrameType::Test,
            },
        }
    }

    /// State of the P/F bit, whichever name the frame family gives it.
    pub fn poll_final(&self) -> bool {
        match *self {
            Control::Information { poll, .. } => poll,
            Control::Supervisory { poll_final, .. } | Control::Unnumbered { poll_final, .. } => {
                poll_final
            }
        }
    }
}

/// A station identifier within the address field, combining a callsign
/// with an SSID.
///
/// One physical bit in the SSID octet serves two roles: for the
/// destination and source it is the command/response bit, while for a
/// repeater it records whether the frame has already passed through. The
/// role is positional; the frame codec assigns it when decoding, and the
/// `*` suffix in the text form marks a repeated repeater entry.
#[derive(Debug, Clone)]
pub struct Address {
    pub(crate) callsign: String,
    pub(crate) ssid: u8,
    pub(crate) c_bit: bool,
    pub(crate) repeater: bool,
}

impl Address {
    /// Create an address from a bare callsign and a numeric SSID.
    ///
    /// Lowercase input is normalised to uppercase. For the combined
    /// `CALL-SSID` text form use `str::parse` instead.
    pub fn new(callsign: &str, ssid: u8) -> Result<Address, AddressParseError> {
        let callsign = callsign.to_uppercase();
        if callsign.is_empty()
            || callsign.len() > CALL_LEN
            || !callsign.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(AddressParseError::InvalidCallsign);
        }
        if ssid > 15 {
            return Err(AddressParseError::SsidOutOfRange);
        }
        Ok(Address {
            callsign,
            ssid,
            c_bit: false,
            repeater: false,
        })
    }

    /// The callsign without its SSID, e.g. "VK7NTK"
    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    /// Secondary Station Identifier, from 0 to 15
    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Whether this address occupies a repeater slot.
    pub fn is_repeater(&self) -> bool {
        self.repeater
    }

    /// Whether the frame has passed through this repeater. Meaningful
    /// only for repeater entries.
    pub fn has_been_repeated(&self) -> bool {
        self.repeater && self.c_bit
    }

    /// State of the command/response bit. Meaningful only in the
    /// destination or source slot.
    pub fn is_command_response(&self) -> bool {
        !self.repeater && self.c_bit
    }

    /// Set the command/response bit, marking the address as a
    /// non-repeater at the same time.
    pub fn set_command_response(&mut self, value: bool) {
        self.repeater = false;
        self.c_bit = value;
    }

    /// Set the has-been-repeated bit, marking the address as a repeater
    /// at the same time.
    pub fn set_has_been_repeated(&mut self, value: bool) {
        self.repeater = true;
        self.c_bit = value;
    }

    /// Encode as a seven-octet address subfield. The extension bit is
    /// left clear; the frame codec sets it on the final subfield.
    pub(crate) fn to_bytes(&self) -> [u8; ADDR_LEN] {
        // Callsign octets are shifted left one bit, padded with spaces
        let mut encoded = [b' ' << 1; ADDR_LEN];
        for (i, b) in self.callsign.bytes().enumerate() {
            encoded[i] = b << 1;
        }
        let mut ssid_byte = RESERVED_BITS | (self.ssid << 1);
        if self.c_bit {
            ssid_byte |= C_BIT;
        }
        encoded[CALL_LEN] = ssid_byte;
        encoded
    }

    /// Decode a seven-octet address subfield. The reserved bits and the
    /// extension bit are ignored.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Address, FrameParseError> {
        let mut callsign = String::with_capacity(CALL_LEN);
        for &b in &bytes[0..CALL_LEN] {
            callsign.push((b >> 1) as char);
        }
        callsign.truncate(callsign.trim_end_matches(' ').len());
        if callsign.is_empty()
            || !callsign
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(FrameParseError::InvalidAddress);
        }
        Ok(Address {
            callsign,
            ssid: (bytes[CALL_LEN] & SSID_MASK) >> 1,
            c_bit: bytes[CALL_LEN] & C_BIT > 0,
            repeater: false,
        })
    }
}

impl Default for Address {
    fn default() -> Address {
        Address {
            callsign: "NOCALL".to_string(),
            ssid: 0,
            c_bit: false,
            repeater: false,
        }
    }
}

// The repeater role is positional, not part of the encoded identity, so
// it is excluded from comparisons.
impl PartialEq for Address {
    fn eq(&self, other: &Address) -> bool {
        self.callsign == other.callsign && self.ssid == other.ssid && self.c_bit == other.c_bit
    }
}

impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.callsign)?;
        if self.ssid != 0 {
            write!(f, "-{}", self.ssid)?;
        }
        if self.has_been_repeated() {
            write!(f, "*")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Parse the text form `CALL[-SSID][*]`. A trailing asterisk marks a
    /// repeater entry the frame has already passed through.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (s, repeated) = match s.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() > 2 {
            return Err(AddressParseError::InvalidCallsign);
        }
        let ssid = match parts.get(1) {
            Some(ssid_str) => {
                let ssid = ssid_str
                    .parse::<u8>()
                    .map_err(|e| AddressParseError::InvalidSsid { source: e })?;
                if ssid > 15 {
                    return Err(AddressParseError::SsidOutOfRange);
                }
                ssid
            }
            None => 0,
        };
        let mut address = Address::new(parts[0], ssid)?;
        if repeated {
            address.set_has_been_repeated(true);
        }
        Ok(address)
    }
}

/// Indicates whether a given frame is a Command or a Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResponse {
    Command,
    Response,
}

/// A strongly-typed representation of a single AX.25 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Frame {
    /// Destination station
    pub destination: Address,
    /// Sending station
    pub source: Address,
    /// Repeaters the frame passes through, in path order; at most eight
    pub via: Vec<Address>,
    /// Control field
    pub control: Control,
    /// Protocol identifier; present exactly for I and UI frames
    pub pid: Option<u8>,
    /// Information field; present exactly for I and UI frames, possibly empty
    pub data: Option<Vec<u8>>,
}

impl Ax25Frame {
    /// Parse raw bytes into an `Ax25Frame` if possible.
    ///
    /// The input must be a single de-framed packet: no flags, no
    /// bit-stuffing, and the FCS already stripped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Ax25Frame, FrameParseError> {
        // Walk the address field in seven-octet strides until an SSID
        // octet carries the extension bit.
        let mut count = 0;
        loop {
            let ssid_index = count * ADDR_LEN + CALL_LEN;
            if ssid_index >= bytes.len() {
                return Err(FrameParseError::TruncatedFrame { len: bytes.len() });
            }
            count += 1;
            if bytes[ssid_index] & HDLC_EXTENSION > 0 {
                break;
            }
        }
        if count < 2 {
            // Address field terminated before a source was present
            return Err(FrameParseError::TruncatedFrame { len: bytes.len() });
        }
        if count - 2 > MAX_DIGIPEATERS {
            return Err(FrameParseError::TooManyRepeaters { count: count - 2 });
        }

        let destination = Address::from_bytes(&bytes[0..ADDR_LEN])?;
        let source = Address::from_bytes(&bytes[ADDR_LEN..2 * ADDR_LEN])?;
        let mut via = Vec::with_capacity(count - 2);
        for i in 2..count {
            let mut repeater = Address::from_bytes(&bytes[i * ADDR_LEN..(i + 1) * ADDR_LEN])?;
            repeater.repeater = true;
            via.push(repeater);
        }

        let control_index = count * ADDR_LEN;
        if control_index >= bytes.len() {
            return Err(FrameParseError::TruncatedFrame { len: bytes.len() });
        }
        let control = Control::from_byte(bytes[control_index])?;

        let rest = &bytes[control_index + 1..];
        let (pid, data) = if control.frame_type().has_pid() {
            match rest.split_first() {
                Some((&pid, data)) => (Some(pid), Some(data.to_vec())),
                None => return Err(FrameParseError::TruncatedFrame { len: bytes.len() }),
            }
        } else if !rest.is_empty() {
            return Err(FrameParseError::UnexpectedTrailer { len: rest.len() });
        } else {
            (None, None)
        };

        Ok(Ax25Frame {
            destination,
            source,
            via,
            control,
            pid,
            data,
        })
    }

    /// Encode an `Ax25Frame` struct as raw bytes for transmission.
    ///
    /// The PID octet and information field are written only for I and UI
    /// frames; a missing PID is written as 0xF0 (no layer 3) and a
    /// missing information field as empty. Panics if the via path lists
    /// more than eight repeaters.
    pub fn to_bytes(&self) -> Vec<u8> {
        assert!(
            self.via.len() <= MAX_DIGIPEATERS,
            "via path is limited to {} repeaters",
            MAX_DIGIPEATERS
        );
        let mut frame = Vec::new();
        frame.extend(self.destination.to_bytes());
        frame.extend(self.source.to_bytes());
        for repeater in &self.via {
            frame.extend(repeater.to_bytes());
        }
        // Mark the end of the address field on its final SSID octet
        let last = frame.len() - 1;
        frame[last] |= HDLC_EXTENSION;

        frame.push(self.control.to_byte());
        if self.control.frame_type().has_pid() {
            frame.push(self.pid.unwrap_or(PID_NO_LAYER3));
            if let Some(ref data) = self.data {
                frame.extend(data);
            }
        }
        frame
    }

    /// How the command/response bit pair of this frame reads under v2.2
    /// rules. `None` means both bits agree, which identifies a station
    /// speaking the older v2.0 protocol.
    pub fn command_or_response(&self) -> Option<CommandResponse> {
        match (
            self.destination.is_command_response(),
            self.source.is_command_response(),
        ) {
            (true, false) => Some(CommandResponse::Command),
            (false, true) => Some(CommandResponse::Response),
            _ => None,
        }
    }

    /// Returns a UTF-8 string that is a "best effort" at displaying the
    /// information content of this frame. Returns None if there is no
    /// information field present. Most applications will need to work
    /// with the `Vec<u8>` data directly.
    pub fn info_string_lossy(&self) -> Option<String> {
        self.data
            .as_ref()
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }
}

impl fmt::Display for Ax25Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let info_display = match self.info_string_lossy() {
            Some(ref info) => info.clone(),
            None => "-".to_string(),
        };
        write!(
            f,
            "Source\t\t{}\nDestination\t{}\n\
             Type\t\t{}\nData\t\t\"{}\"",
            self.source,
            self.destination,
            self.control.frame_type(),
            info_display
        )
    }
}
