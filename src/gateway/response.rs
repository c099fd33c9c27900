//! Response interpreter for the gateway's XML payloads.
//!
//! The two integration modes return differently structured documents for the
//! same logical fields: the direct (server-hosted) flow nests them under a
//! `Transaction` element, the hosted-page flow returns them flat at the top
//! level. Accessors here check the nested shape first and fall back to the
//! flat one. Parsing never raises; a malformed payload simply yields no
//! interpreter, and every accessor degrades to `None`.

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq, Eq)]
struct XmlElement {
    name: String,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parsed view of a retained gateway response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseXml {
    root: XmlElement,
}

impl ResponseXml {
    /// Parses a raw payload. Returns `None` for anything that is not a
    /// well-formed document with a single root element.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut reader = Reader::from_str(raw);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        // A contiguous stretch of character content (text, inline entity
        // references and CDATA) forms one logical value that is trimmed as a
        // whole. It is accumulated here and flushed into the enclosing
        // element's text when the next structural event ends the stretch.
        let mut run = String::new();
        let mut in_run = false;

        macro_rules! flush_run {
            () => {
                if in_run {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(run.trim());
                    }
                    run.clear();
                    in_run = false;
                }
            };
        }

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    flush_run!();
                    if root.is_some() && stack.is_empty() {
                        // Second root element.
                        return None;
                    }
                    stack.push(XmlElement {
                        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                        text: String::new(),
                        children: Vec::new(),
                    });
                }
                Ok(Event::Empty(start)) => {
                    flush_run!();
                    let element = XmlElement {
                        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                        text: String::new(),
                        children: Vec::new(),
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None if root.is_none() => root = Some(element),
                        None => return None,
                    }
                }
                Ok(Event::Text(text)) => {
                    let decoded = match text.decode() {
                        Ok(cow) => cow,
                        Err(_) => return None,
                    };
                    match unescape(&decoded) {
                        Ok(cow) => run.push_str(&cow),
                        Err(_) => return None,
                    }
                    in_run = true;
                }
                Ok(Event::GeneralRef(reference)) => {
                    let decoded = match reference.decode() {
                        Ok(cow) => cow,
                        Err(_) => return None,
                    };
                    // Rebuild the reference so the standard unescaper resolves
                    // both named (`&amp;`) and numeric (`&#49;`) forms.
                    match unescape(&format!("&{};", decoded)) {
                        Ok(cow) => run.push_str(&cow),
                        Err(_) => return None,
                    }
                    in_run = true;
                }
                Ok(Event::CData(data)) => {
                    run.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    in_run = true;
                }
                Ok(Event::End(end)) => {
                    flush_run!();
                    let finished = stack.pop()?;
                    if finished.name.as_bytes() != end.name().as_ref() {
                        return None;
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => root = Some(finished),
                    }
                }
                Ok(Event::Eof) => {
                    flush_run!();
                    break;
                }
                Ok(_) => {}
                Err(_) => return None,
            }
        }

        if !stack.is_empty() {
            return None;
        }
        root.map(|root| ResponseXml { root })
    }

    /// Text of a direct child of the document root.
    pub fn top(&self, name: &str) -> Option<&str> {
        self.root.child(name).map(|c| c.text.as_str())
    }

    /// Dual-shape lookup: when a nested `Transaction` element is present its
    /// fields win outright, even over a top-level duplicate; otherwise the
    /// flat top-level field is used.
    pub fn txn_field(&self, name: &str) -> Option<&str> {
        match self.root.child("Transaction") {
            Some(txn) => txn.child(name).map(|c| c.text.as_str()),
            None => self.top(name),
        }
    }

    /// Settlement amount. Returned by the hosted-page flow only, and always
    /// at the top level of the document.
    pub fn amount_settlement(&self) -> Option<&str> {
        self.top("AmountSettlement")
    }

    pub fn card_name(&self) -> Option<&str> {
        self.txn_field("CardName")
    }

    pub fn card_holder_name(&self) -> Option<&str> {
        self.txn_field("CardHolderName")
    }

    pub fn date_expiry(&self) -> Option<&str> {
        self.txn_field("DateExpiry")
    }

    /// Masked card number as echoed by the gateway.
    pub fn card_number(&self) -> Option<&str> {
        self.txn_field("CardNumber")
    }

    pub fn txn_ref(&self) -> Option<&str> {
        self.txn_field("TxnRef")
    }

    pub fn auth_code(&self) -> Option<&str> {
        self.txn_field("AuthCode")
    }

    /// The gateway's boolean success flag, wherever it appears.
    pub fn success_flag(&self) -> Option<bool> {
        self.txn_field("Success")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        assert!(ResponseXml::parse("").is_none());
        assert!(ResponseXml::parse("   ").is_none());
    }

    #[test]
    fn malformed_payload_is_rejected_not_panicked() {
        assert!(ResponseXml::parse("this is not xml").is_none());
        assert!(ResponseXml::parse("<Txn><Open>").is_none());
        assert!(ResponseXml::parse("<Txn></Mismatch>").is_none());
        assert!(ResponseXml::parse("<A/><B/>").is_none());
    }

    #[test]
    fn flat_hosted_shape_is_read_from_top_level() {
        let xml = ResponseXml::parse(
            "<Response>\
                <AmountSettlement>12.50</AmountSettlement>\
                <CardName>Visa</CardName>\
                <CardHolderName>J SHOPPER</CardHolderName>\
                <DateExpiry>1227</DateExpiry>\
                <CardNumber>411111........11</CardNumber>\
             </Response>",
        )
        .unwrap();

        assert_eq!(xml.amount_settlement(), Some("12.50"));
        assert_eq!(xml.card_name(), Some("Visa"));
        assert_eq!(xml.card_holder_name(), Some("J SHOPPER"));
        assert_eq!(xml.date_expiry(), Some("1227"));
        assert_eq!(xml.card_number(), Some("411111........11"));
    }

    #[test]
    fn nested_transaction_element_wins_over_top_level_duplicate() {
        let xml = ResponseXml::parse(
            "<Response>\
                <CardName>TopLevel</CardName>\
                <Transaction>\
                    <CardName>Nested</CardName>\
                    <Success>1</Success>\
                </Transaction>\
             </Response>",
        )
        .unwrap();

        assert_eq!(xml.card_name(), Some("Nested"));
        assert_eq!(xml.success_flag(), Some(true));
    }

    #[test]
    fn nested_shape_does_not_fall_back_for_missing_fields() {
        let xml = ResponseXml::parse(
            "<Response>\
                <DateExpiry>9999</DateExpiry>\
                <Transaction><CardName>Visa</CardName></Transaction>\
             </Response>",
        )
        .unwrap();

        // The nested shape is authoritative once present.
        assert_eq!(xml.date_expiry(), None);
    }

    #[test]
    fn settlement_amount_ignores_the_nested_shape() {
        let xml = ResponseXml::parse(
            "<Response>\
                <Transaction><AmountSettlement>5.00</AmountSettlement></Transaction>\
             </Response>",
        )
        .unwrap();
        assert_eq!(xml.amount_settlement(), None);
    }

    #[test]
    fn success_flag_variants() {
        let yes = ResponseXml::parse("<R><Success>1</Success></R>").unwrap();
        let no = ResponseXml::parse("<R><Success>0</Success></R>").unwrap();
        let absent = ResponseXml::parse("<R><Other>x</Other></R>").unwrap();
        assert_eq!(yes.success_flag(), Some(true));
        assert_eq!(no.success_flag(), Some(false));
        assert_eq!(absent.success_flag(), None);
    }

    #[test]
    fn entities_and_cdata_are_decoded() {
        let xml =
            ResponseXml::parse("<R><CardHolderName>A &amp; B</CardHolderName></R>").unwrap();
        assert_eq!(xml.card_holder_name(), Some("A & B"));

        let xml = ResponseXml::parse("<R><CardName><![CDATA[Visa]]></CardName></R>").unwrap();
        assert_eq!(xml.card_name(), Some("Visa"));
    }
}
