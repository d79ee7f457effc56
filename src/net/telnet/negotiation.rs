//! Telnet option handling for a character-at-a-time session: the server echoes,
//! go-ahead is suppressed both ways and linemode stays off. Window size is asked for
//! and reported when the client offers it.

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const ECHO: u8 = 1;
const SGA: u8 = 3;
const TTYPE: u8 = 24;
const NAWS: u8 = 31;
const LINEMODE: u8 = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetIn {
    Data(u8),
    Naws { cols: u16, rows: u16 },
}

#[derive(Debug, Default)]
pub struct TelnetResponse {
    pub event: Option<TelnetIn>,
    /// Bytes to send back to the client
    pub reply: Option<[u8; 3]>,
}

impl TelnetResponse {
    fn event(e: TelnetIn) -> Self {
        Self {
            event: Some(e),
            reply: None,
        }
    }

    fn reply(cmd: u8, opt: u8) -> Self {
        Self {
            event: None,
            reply: Some([IAC, cmd, opt]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parse {
    Data,
    Iac,
    Option(u8),
    SubOption,
    Sub,
    SubIac,
}

#[derive(Debug)]
pub struct TelnetMachine {
    parse: Parse,
    sub_opt: u8,
    sub_buf: Vec<u8>,
}

impl Default for TelnetMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetMachine {
    pub fn new() -> Self {
        Self {
            parse: Parse::Data,
            sub_opt: 0,
            sub_buf: Vec::with_capacity(8),
        }
    }

    /// What we announce right after accepting a connection.
    pub fn start_negotiation() -> Vec<u8> {
        [(DONT, LINEMODE), (DO, SGA), (WILL, SGA), (WILL, ECHO), (DO, NAWS)]
            .iter()
            .flat_map(|&(cmd, opt)| [IAC, cmd, opt])
            .collect()
    }

    /// Feeds one byte from the wire.
    pub fn push(&mut self, b: u8) -> TelnetResponse {
        match self.parse {
            Parse::Data => {
                if b == IAC {
                    self.parse = Parse::Iac;
                    return TelnetResponse::default();
                }
                TelnetResponse::event(TelnetIn::Data(b))
            }
            Parse::Iac => match b {
                IAC => {
                    self.parse = Parse::Data;
                    TelnetResponse::event(TelnetIn::Data(IAC))
                }
                DO | DONT | WILL | WONT => {
                    self.parse = Parse::Option(b);
                    TelnetResponse::default()
                }
                SB => {
                    self.parse = Parse::SubOption;
                    TelnetResponse::default()
                }
                // NOP, GA, AYT and friends carry nothing for us
                _ => {
                    self.parse = Parse::Data;
                    TelnetResponse::default()
                }
            },
            Parse::Option(cmd) => {
                self.parse = Parse::Data;
                answer(cmd, b)
            }
            Parse::SubOption => {
                self.sub_opt = b;
                self.sub_buf.clear();
                self.parse = Parse::Sub;
                TelnetResponse::default()
            }
            Parse::Sub => {
                if b == IAC {
                    self.parse = Parse::SubIac;
                } else {
                    self.sub_buf.push(b);
                }
                TelnetResponse::default()
            }
            Parse::SubIac => match b {
                SE => {
                    self.parse = Parse::Data;
                    self.finish_sub()
                }
                IAC => {
                    self.sub_buf.push(IAC);
                    self.parse = Parse::Sub;
                    TelnetResponse::default()
                }
                _ => {
                    self.parse = Parse::Sub;
                    TelnetResponse::default()
                }
            },
        }
    }

    fn finish_sub(&mut self) -> TelnetResponse {
        let data = std::mem::take(&mut self.sub_buf);
        if self.sub_opt == NAWS && data.len() >= 4 {
            let cols = u16::from_be_bytes([data[0], data[1]]);
            let rows = u16::from_be_bytes([data[2], data[3]]);
            return TelnetResponse::event(TelnetIn::Naws { cols, rows });
        }
        TelnetResponse::default()
    }
}

fn answer(cmd: u8, opt: u8) -> TelnetResponse {
    match (cmd, opt) {
        (DO, ECHO | SGA) => TelnetResponse::reply(WILL, opt),
        (DO, NAWS) => TelnetResponse::default(),
        (DO, _) => TelnetResponse::reply(WONT, opt),
        (DONT, ECHO | SGA | LINEMODE) => TelnetResponse::reply(WONT, opt),
        (WILL, ECHO | SGA | NAWS | TTYPE) => TelnetResponse::reply(DO, opt),
        (WILL, _) => TelnetResponse::reply(DONT, opt),
        _ => TelnetResponse::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(m: &mut TelnetMachine, bytes: &[u8]) -> Vec<TelnetResponse> {
        bytes.iter().map(|&b| m.push(b)).collect()
    }

    #[test]
    fn plain_bytes_pass_through() {
        let mut m = TelnetMachine::new();
        let out = feed(&mut m, b"hi");
        assert_eq!(out[0].event, Some(TelnetIn::Data(b'h')));
        assert_eq!(out[1].event, Some(TelnetIn::Data(b'i')));
    }

    #[test]
    fn escaped_iac_is_data() {
        let mut m = TelnetMachine::new();
        let out = feed(&mut m, &[IAC, IAC]);
        assert_eq!(out[1].event, Some(TelnetIn::Data(IAC)));
    }

    #[test]
    fn linemode_is_refused() {
        let mut m = TelnetMachine::new();
        let out = feed(&mut m, &[IAC, WILL, LINEMODE]);
        assert_eq!(out[2].reply, Some([IAC, DONT, LINEMODE]));
        assert!(out.iter().all(|r| r.event.is_none()));
    }

    #[test]
    fn window_size_is_reported() {
        let mut m = TelnetMachine::new();
        let out = feed(&mut m, &[IAC, SB, NAWS, 0, 80, 0, 24, IAC, SE, b'x']);
        assert_eq!(out[8].event, Some(TelnetIn::Naws { cols: 80, rows: 24 }));
        assert_eq!(out[9].event, Some(TelnetIn::Data(b'x')));
    }

    #[test]
    fn negotiation_announces_echo() {
        let bytes = TelnetMachine::start_negotiation();
        assert!(bytes.windows(3).any(|w| w == [IAC, WILL, ECHO]));
    }
}
