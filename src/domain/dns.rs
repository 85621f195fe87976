//! DNS message domain models.
//!
//! Only the parts needed to report queries are modelled: the QR flag
//! and the question section.

/// DNS resource record types as defined in RFC 1035 and successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Hinfo,
    Mx,
    Txt,
    Aaaa,
    Srv,
    Naptr,
    Opt,
    Ds,
    Rrsig,
    Nsec,
    Dnskey,
    Svcb,
    Https,
    Any,
    Unknown(u16),
}

impl DnsType {
    /// Parse from the QTYPE field.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            13 => Self::Hinfo,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            35 => Self::Naptr,
            41 => Self::Opt,
            43 => Self::Ds,
            46 => Self::Rrsig,
            47 => Self::Nsec,
            48 => Self::Dnskey,
            64 => Self::Svcb,
            65 => Self::Https,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for DnsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Ns => write!(f, "NS"),
            Self::Cname => write!(f, "CNAME"),
            Self::Soa => write!(f, "SOA"),
            Self::Ptr => write!(f, "PTR"),
            Self::Hinfo => write!(f, "HINFO"),
            Self::Mx => write!(f, "MX"),
            Self::Txt => write!(f, "TXT"),
            Self::Aaaa => write!(f, "AAAA"),
            Self::Srv => write!(f, "SRV"),
            Self::Naptr => write!(f, "NAPTR"),
            Self::Opt => write!(f, "OPT"),
            Self::Ds => write!(f, "DS"),
            Self::Rrsig => write!(f, "RRSIG"),
            Self::Nsec => write!(f, "NSEC"),
            Self::Dnskey => write!(f, "DNSKEY"),
            Self::Svcb => write!(f, "SVCB"),
            Self::Https => write!(f, "HTTPS"),
            Self::Any => write!(f, "ANY"),
            Self::Unknown(value) => write!(f, "TYPE{}", value),
        }
    }
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Query name without the trailing dot
    pub name: String,
    pub qtype: DnsType,
}

impl std::fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.qtype)
    }
}

/// A parsed DNS message: the QR flag plus its questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    /// QR bit: false for a query, true for a response
    pub is_response: bool,
    pub questions: Vec<DnsQuestion>,
}

impl DnsMessage {
    /// Questions worth reporting: those of a query, never of a response.
    pub fn queries(&self) -> &[DnsQuestion] {
        if self.is_response {
            &[]
        } else {
            &self.questions
        }
    }
}
