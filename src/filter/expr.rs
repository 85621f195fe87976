//! Filter expression parser and evaluator.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr      := and_expr (("or" | "||") and_expr)*
//! and_expr  := unary (("and" | "&&") unary)*
//! unary     := ("not" | "!") unary | "(" expr ")" | primitive
//! primitive := proto [qualifier] | qualifier
//! qualifier := [dir] ("host" ADDR | "net" CIDR | "port" N | "portrange" N-M | ADDR)
//!            | "less" N | "greater" N
//! ```
//!
//! Runs of `and`/`or` are kept flat, so only `not` and parentheses
//! deepen the tree. Their nesting is capped at [`MAX_NESTING`].

use std::net::IpAddr;

use crate::domain::{DecodedPacket, NetworkLayer, TransportLayer};
use crate::error::FilterError;

const ETHERTYPE_ARP: u16 = 0x0806;

/// Deepest allowed nesting of `not` and parentheses
pub const MAX_NESTING: usize = 256;

/// Which endpoint a qualifier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Either,
    Source,
    Destination,
}

/// Protocol primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ip,
    Ip6,
    Arp,
    Tcp,
    Udp,
    Icmp,
    Icmp6,
}

impl Protocol {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "ip" => Some(Self::Ip),
            "ip6" => Some(Self::Ip6),
            "arp" => Some(Self::Arp),
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "icmp" => Some(Self::Icmp),
            "icmp6" => Some(Self::Icmp6),
            _ => None,
        }
    }

    fn matches(&self, packet: &DecodedPacket) -> bool {
        match self {
            Self::Ip => matches!(packet.network, Some(NetworkLayer::Ipv4 { .. })),
            Self::Ip6 => matches!(packet.network, Some(NetworkLayer::Ipv6 { .. })),
            Self::Arp => packet.ethertype == Some(ETHERTYPE_ARP),
            Self::Tcp => matches!(packet.transport, Some(TransportLayer::Tcp { .. })),
            Self::Udp => matches!(packet.transport, Some(TransportLayer::Udp { .. })),
            Self::Icmp => matches!(packet.transport, Some(TransportLayer::Icmpv4 { .. })),
            Self::Icmp6 => matches!(packet.transport, Some(TransportLayer::Icmpv6 { .. })),
        }
    }
}

/// A single test against a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Protocol(Protocol),
    Host(Direction, IpAddr),
    Net(Direction, IpAddr, u8),
    /// Port range (inclusive), optionally restricted to TCP or UDP
    Port {
        protocol: Option<Protocol>,
        direction: Direction,
        low: u16,
        high: u16,
    },
    Less(usize),
    Greater(usize),
}

impl Predicate {
    fn matches(&self, packet: &DecodedPacket) -> bool {
        match self {
            Predicate::Protocol(protocol) => protocol.matches(packet),
            Predicate::Host(direction, addr) => endpoints(packet, *direction, |ip| ip == *addr),
            Predicate::Net(direction, network, prefix) => {
                endpoints(packet, *direction, |ip| in_network(ip, *network, *prefix))
            }
            Predicate::Port {
                protocol,
                direction,
                low,
                high,
            } => {
                let Some(transport) = packet.transport else {
                    return false;
                };
                if let Some(protocol) = protocol {
                    if !protocol.matches(packet) {
                        return false;
                    }
                }
                let Some((src, dst)) = transport.ports() else {
                    return false;
                };
                let hit = |port: u16| (*low..=*high).contains(&port);
                match direction {
                    Direction::Either => hit(src) || hit(dst),
                    Direction::Source => hit(src),
                    Direction::Destination => hit(dst),
                }
            }
            Predicate::Less(limit) => packet.length <= *limit,
            Predicate::Greater(limit) => packet.length >= *limit,
        }
    }
}

fn endpoints(packet: &DecodedPacket, direction: Direction, test: impl Fn(IpAddr) -> bool) -> bool {
    let Some(network) = packet.network else {
        return false;
    };
    match direction {
        Direction::Either => test(network.source()) || test(network.destination()),
        Direction::Source => test(network.source()),
        Direction::Destination => test(network.destination()),
    }
}

fn in_network(ip: IpAddr, network: IpAddr, prefix: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(ip) & mask == u32::from(net) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(ip) & mask == u128::from(net) & mask
        }
        _ => false,
    }
}

/// Boolean expression tree over predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Predicate(Predicate),
    Not(Box<Expr>),
    /// Every term must match
    All(Vec<Expr>),
    /// At least one term must match
    Any(Vec<Expr>),
}

impl Expr {
    pub fn matches(&self, packet: &DecodedPacket) -> bool {
        match self {
            Expr::Predicate(predicate) => predicate.matches(packet),
            Expr::Not(inner) => !inner.matches(packet),
            Expr::All(terms) => terms.iter().all(|term| term.matches(packet)),
            Expr::Any(terms) => terms.iter().any(|term| term.matches(packet)),
        }
    }
}

/// A compiled filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterProgram {
    root: Expr,
}

impl FilterProgram {
    /// Compile an expression such as `tcp port 80 or udp dst port 53`.
    pub fn compile(expression: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(expression);
        if tokens.is_empty() {
            return Err(FilterError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(token.unexpected());
        }

        Ok(Self { root })
    }

    pub fn matches(&self, packet: &DecodedPacket) -> bool {
        self.root.matches(packet)
    }
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    position: usize,
}

impl Token {
    fn unexpected(&self) -> FilterError {
        FilterError::UnexpectedToken {
            token: self.text.clone(),
            position: self.position,
        }
    }

    fn is(&self, words: &[&str]) -> bool {
        words.contains(&self.text.as_str())
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut i = 0;

    let flush = |current: &mut String, start: usize, tokens: &mut Vec<Token>| {
        if !current.is_empty() {
            tokens.push(Token {
                text: std::mem::take(current).to_ascii_lowercase(),
                position: start,
            });
        }
    };

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let operator = match (c, next) {
            ('&', Some('&')) => Some("&&"),
            ('|', Some('|')) => Some("||"),
            ('(', _) => Some("("),
            (')', _) => Some(")"),
            ('!', _) => Some("!"),
            _ => None,
        };

        if let Some(op) = operator {
            flush(&mut current, start, &mut tokens);
            tokens.push(Token {
                text: op.to_string(),
                position: pos,
            });
            i += op.len();
            continue;
        }

        if c.is_whitespace() {
            flush(&mut current, start, &mut tokens);
        } else {
            if current.is_empty() {
                start = pos;
            }
            current.push(c);
        }
        i += 1;
    }
    flush(&mut current, start, &mut tokens);

    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current nesting of `not` and parentheses
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, words: &[&str]) -> bool {
        self.peek().map(|t| t.is(words)).unwrap_or(false)
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, FilterError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(FilterError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek_is(&["or", "||"]) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(flatten(terms, Expr::Any))
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut terms = vec![self.parse_unary()?];
        while self.peek_is(&["and", "&&"]) {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        Ok(flatten(terms, Expr::All))
    }

    fn parse_unary(&mut self) -> Result<Expr, FilterError> {
        if self.peek_is(&["not", "!"]) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.peek_is(&["("]) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_or()?;
            let close = self.next("')'")?;
            if close.text != ")" {
                return Err(close.unexpected());
            }
            self.depth -= 1;
            return Ok(inner);
        }
        self.parse_primitive()
    }

    fn descend(&mut self) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FilterError::TooDeep { limit: MAX_NESTING });
        }
        Ok(())
    }

    fn parse_primitive(&mut self) -> Result<Expr, FilterError> {
        let token = self.next("a filter primitive")?;

        if let Some(protocol) = Protocol::from_keyword(&token.text) {
            let proto = Expr::Predicate(Predicate::Protocol(protocol));
            if !self.peek_is(&["src", "dst", "host", "net", "port", "portrange"]) {
                return Ok(proto);
            }
            let port_protocol = match protocol {
                Protocol::Tcp | Protocol::Udp => Some(protocol),
                _ => None,
            };
            let qualifier = self.parse_qualifier(port_protocol)?;
            return Ok(Expr::All(vec![proto, Expr::Predicate(qualifier)]));
        }

        match token.text.as_str() {
            "less" => {
                let value = self.next("a length")?;
                Ok(Expr::Predicate(Predicate::Less(parse_length(&value.text)?)))
            }
            "greater" => {
                let value = self.next("a length")?;
                Ok(Expr::Predicate(Predicate::Greater(parse_length(&value.text)?)))
            }
            "src" | "dst" | "host" | "net" | "port" | "portrange" => {
                self.pos -= 1;
                Ok(Expr::Predicate(self.parse_qualifier(None)?))
            }
            _ => Err(token.unexpected()),
        }
    }

    fn parse_qualifier(&mut self, protocol: Option<Protocol>) -> Result<Predicate, FilterError> {
        let mut direction = Direction::Either;
        if self.peek_is(&["src"]) {
            direction = Direction::Source;
            self.pos += 1;
        } else if self.peek_is(&["dst"]) {
            direction = Direction::Destination;
            self.pos += 1;
        }

        let keyword = self.next("host, net, port or portrange")?;
        match keyword.text.as_str() {
            "host" => {
                let value = self.next("an address")?;
                Ok(Predicate::Host(direction, parse_addr(&value.text)?))
            }
            "net" => {
                let value = self.next("a network")?;
                let (addr, prefix) = parse_network(&value.text)?;
                Ok(Predicate::Net(direction, addr, prefix))
            }
            "port" => {
                let value = self.next("a port")?;
                let port = parse_port(&value.text)?;
                Ok(Predicate::Port {
                    protocol,
                    direction,
                    low: port,
                    high: port,
                })
            }
            "portrange" => {
                let value = self.next("a port range")?;
                let (low, high) = value
                    .text
                    .split_once('-')
                    .ok_or_else(|| FilterError::InvalidPort(value.text.clone()))?;
                let (low, high) = (parse_port(low)?, parse_port(high)?);
                if low > high {
                    return Err(FilterError::InvalidPort(value.text));
                }
                Ok(Predicate::Port {
                    protocol,
                    direction,
                    low,
                    high,
                })
            }
            // `src 10.0.0.1` is shorthand for `src host 10.0.0.1`
            _ if direction != Direction::Either => {
                Ok(Predicate::Host(direction, parse_addr(&keyword.text)?))
            }
            _ => Err(keyword.unexpected()),
        }
    }
}

/// A single term stands alone; several are joined by `join`.
fn flatten(mut terms: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}

fn parse_port(text: &str) -> Result<u16, FilterError> {
    text.parse()
        .map_err(|_| FilterError::InvalidPort(text.to_string()))
}

fn parse_length(text: &str) -> Result<usize, FilterError> {
    text.parse()
        .map_err(|_| FilterError::InvalidLength(text.to_string()))
}

fn parse_addr(text: &str) -> Result<IpAddr, FilterError> {
    text.parse()
        .map_err(|_| FilterError::InvalidAddress(text.to_string()))
}

fn parse_network(text: &str) -> Result<(IpAddr, u8), FilterError> {
    let invalid = || FilterError::InvalidNetwork(text.to_string());
    let (addr, prefix) = match text.split_once('/') {
        Some((addr, prefix)) => {
            let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
            let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
            (addr, prefix)
        }
        None => {
            let addr: IpAddr = text.parse().map_err(|_| invalid())?;
            let full = if addr.is_ipv4() { 32 } else { 128 };
            (addr, full)
        }
    };
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid());
    }
    Ok((addr, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn tcp_packet(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> DecodedPacket {
        DecodedPacket::new(74)
            .with_network(NetworkLayer::Ipv4 {
                source: Ipv4Addr::from(src),
                destination: Ipv4Addr::from(dst),
            })
            .with_transport(TransportLayer::Tcp {
                source_port: sport,
                destination_port: dport,
            })
    }

    fn udp_packet(sport: u16, dport: u16) -> DecodedPacket {
        DecodedPacket::new(80)
            .with_network(NetworkLayer::Ipv4 {
                source: Ipv4Addr::new(10, 0, 0, 2),
                destination: Ipv4Addr::new(10, 0, 0, 53),
            })
            .with_transport(TransportLayer::Udp {
                source_port: sport,
                destination_port: dport,
            })
    }

    fn compile(expr: &str) -> FilterProgram {
        FilterProgram::compile(expr).unwrap()
    }

    #[test]
    fn test_protocol_primitives() {
        let tcp = tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
        assert!(compile("tcp").matches(&tcp));
        assert!(compile("ip").matches(&tcp));
        assert!(!compile("udp").matches(&tcp));
        assert!(!compile("ip6").matches(&tcp));
    }

    #[test]
    fn test_proto_port() {
        let filter = compile("tcp port 80");
        assert!(filter.matches(&tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 40000, 80)));
        assert!(!filter.matches(&tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 40000, 443)));
        assert!(!filter.matches(&udp_packet(40000, 80)));
    }

    #[test]
    fn test_direction_qualifiers() {
        let packet = udp_packet(40000, 53);
        assert!(compile("udp dst port 53").matches(&packet));
        assert!(!compile("udp src port 53").matches(&packet));
        assert!(compile("src host 10.0.0.2").matches(&packet));
        assert!(compile("dst 10.0.0.53").matches(&packet));
        assert!(!compile("dst host 10.0.0.2").matches(&packet));
    }

    #[test]
    fn test_boolean_operators_and_precedence() {
        let packet = udp_packet(40000, 53);
        assert!(compile("tcp or udp").matches(&packet));
        assert!(compile("not tcp").matches(&packet));
        assert!(compile("!tcp && udp").matches(&packet));
        // and binds tighter: tcp or (udp and port 80)
        assert!(!compile("tcp or udp and port 80").matches(&packet));
        assert!(compile("(tcp or udp) and port 53").matches(&packet));
    }

    #[test]
    fn test_net_and_portrange() {
        let packet = tcp_packet([192, 168, 1, 20], [8, 8, 8, 8], 50000, 443);
        assert!(compile("src net 192.168.0.0/16").matches(&packet));
        assert!(!compile("dst net 192.168.0.0/16").matches(&packet));
        assert!(compile("net 0.0.0.0/0").matches(&packet));
        assert!(compile("portrange 400-500").matches(&packet));
        assert!(!compile("tcp dst portrange 1-442").matches(&packet));
    }

    #[test]
    fn test_length_primitives() {
        let packet = udp_packet(1, 2);
        assert!(compile("less 80").matches(&packet));
        assert!(compile("greater 80").matches(&packet));
        assert!(!compile("greater 81").matches(&packet));
    }

    #[test]
    fn test_arp_uses_ethertype() {
        let mut packet = DecodedPacket::new(42);
        packet.ethertype = Some(ETHERTYPE_ARP);
        assert!(compile("arp").matches(&packet));
        assert!(!compile("ip").matches(&packet));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(FilterProgram::compile("   "), Err(FilterError::Empty));
        assert!(matches!(
            FilterProgram::compile("tcp port"),
            Err(FilterError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            FilterProgram::compile("tcp port http"),
            Err(FilterError::InvalidPort(_))
        ));
        assert!(matches!(
            FilterProgram::compile("tcp udp"),
            Err(FilterError::UnexpectedToken { ref token, position: 4 }) if token == "udp"
        ));
        assert!(matches!(
            FilterProgram::compile("(tcp"),
            Err(FilterError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            FilterProgram::compile("host 999.1.1.1"),
            Err(FilterError::InvalidAddress(_))
        ));
        assert!(matches!(
            FilterProgram::compile("net 10.0.0.0/33"),
            Err(FilterError::InvalidNetwork(_))
        ));
        assert!(matches!(
            FilterProgram::compile("portrange 90-80"),
            Err(FilterError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_tokenizer_splits_operators() {
        let tokens: Vec<_> = tokenize("!(tcp&&udp)||arp").into_iter().map(|t| t.text).collect();
        assert_eq!(tokens, ["!", "(", "tcp", "&&", "udp", ")", "||", "arp"]);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let packet = tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
        assert!(compile("  TCP Port 80 ").matches(&packet));
    }

    #[test]
    fn test_nesting_limit() {
        let packet = udp_packet(40000, 53);

        let deepest = format!("{}udp", "not not ".repeat(MAX_NESTING / 2));
        assert!(compile(&deepest).matches(&packet));

        let parens = format!("{}udp{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(compile(&parens).matches(&packet));

        let too_deep = format!("{}tcp", "!".repeat(200_000));
        assert_eq!(
            FilterProgram::compile(&too_deep),
            Err(FilterError::TooDeep { limit: MAX_NESTING })
        );

        let too_many_parens = format!("{}udp{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert_eq!(
            FilterProgram::compile(&too_many_parens),
            Err(FilterError::TooDeep { limit: MAX_NESTING })
        );
    }

    #[test]
    fn test_long_chains_stay_flat() {
        let chain = vec!["port 1"; 100_000].join(" or ");
        let filter = compile(&chain);
        assert!(matches!(&filter.root, Expr::Any(terms) if terms.len() == 100_000));
        assert!(!filter.matches(&udp_packet(40000, 53)));

        let with_match = format!("{} or port 53", chain);
        assert!(compile(&with_match).matches(&udp_packet(40000, 53)));
    }
}
