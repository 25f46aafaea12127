// src/testing.rs

//! Programmatic ATOM page builder and in-memory feed transport for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use quick_xml::escape::escape;

use crate::error::{AppError, Result};
use crate::services::AtomFetcher;

const FEED_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:at="http://purl.org/atompub/tombstones/1.0"
      xmlns:cac="urn:dgpe:names:draft:codice:schema:xsd:CommonAggregateComponents-2"
      xmlns:cbc="urn:dgpe:names:draft:codice:schema:xsd:CommonBasicComponents-2"
      xmlns:cac-place-ext="urn:dgpe:names:draft:codice-place-ext:schema:xsd:CommonAggregateComponents-2"
      xmlns:cbc-place-ext="urn:dgpe:names:draft:codice-place-ext:schema:xsd:CommonBasicComponents-2">
"#;

/// Builds one feed page.
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    updated: String,
    next: Option<String>,
    entries: Vec<TestEntry>,
    deleted: Vec<(String, String, Option<String>)>,
}

impl FeedBuilder {
    pub fn new(updated: &str) -> Self {
        Self {
            updated: updated.to_string(),
            next: None,
            entries: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn next(mut self, href: &str) -> Self {
        self.next = Some(href.to_string());
        self
    }

    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn deleted(mut self, entry_id: &str, when: &str, reason: Option<&str>) -> Self {
        self.deleted
            .push((entry_id.into(), when.into(), reason.map(str::to_string)));
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from(FEED_OPEN);
        xml.push_str("<title>Licitaciones publicadas</title>\n");
        xml.push_str(&format!("<updated>{}</updated>\n", self.updated));
        xml.push_str(r#"<link href="https://feeds.example.org/licitaciones.atom" rel="self"/>"#);
        if let Some(next) = &self.next {
            xml.push_str(&format!(r#"<link href="{}" rel="next"/>"#, escape(next.as_str())));
        }
        for entry in &self.entries {
            xml.push_str(&entry.render());
        }
        for (entry_id, when, reason) in &self.deleted {
            xml.push_str(&format!(
                r#"<at:deleted-entry ref="{}" when="{}">"#,
                escape(entry_id.as_str()),
                when
            ));
            if let Some(reason) = reason {
                xml.push_str(&format!(r#"<at:comment type="{reason}"/>"#));
            }
            xml.push_str("</at:deleted-entry>\n");
        }
        xml.push_str("</feed>\n");
        xml
    }
}

/// A tender result block.
#[derive(Debug, Clone)]
pub struct TestResult {
    code: u32,
    lot: Option<String>,
    winner: Option<String>,
    award_date: Option<String>,
}

impl TestResult {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            lot: None,
            winner: None,
            award_date: None,
        }
    }

    pub fn lot(mut self, lot_id: &str) -> Self {
        self.lot = Some(lot_id.into());
        self
    }

    pub fn winner(mut self, nif: &str) -> Self {
        self.winner = Some(nif.into());
        self
    }

    pub fn award_date(mut self, date: &str) -> Self {
        self.award_date = Some(date.into());
        self
    }

    fn render(&self) -> String {
        let mut xml = format!(
            "<cac:TenderResult><cbc:ResultCode listURI=\"TenderResultCode\">{}</cbc:ResultCode>",
            self.code
        );
        if let Some(date) = &self.award_date {
            xml.push_str(&format!("<cbc:AwardDate>{date}</cbc:AwardDate>"));
        }
        xml.push_str("<cbc:ReceivedTenderQuantity>3</cbc:ReceivedTenderQuantity>");
        xml.push_str(r#"<cbc:LowerTenderAmount currencyID="EUR">950</cbc:LowerTenderAmount>"#);
        xml.push_str(r#"<cbc:HigherTenderAmount currencyID="EUR">1150</cbc:HigherTenderAmount>"#);
        if let Some(nif) = &self.winner {
            xml.push_str(&format!(
                "<cac:WinningParty>\
                 <cac:PartyIdentification><cbc:ID schemeName=\"NIF\">{nif}</cbc:ID></cac:PartyIdentification>\
                 <cac:PartyName><cbc:Name>Winner {nif} SL</cbc:Name></cac:PartyName>\
                 <cac:PhysicalLocation><cac:Address><cbc:CityName>Madrid</cbc:CityName>\
                 <cbc:PostalZone>28001</cbc:PostalZone>\
                 <cac:Country><cbc:IdentificationCode>ES</cbc:IdentificationCode></cac:Country>\
                 </cac:Address></cac:PhysicalLocation></cac:WinningParty>"
            ));
        }
        xml.push_str("<cac:AwardedTenderedProject>");
        if let Some(lot) = &self.lot {
            xml.push_str(&format!(
                "<cbc:ProcurementProjectLotID>{lot}</cbc:ProcurementProjectLotID>"
            ));
        }
        xml.push_str(
            "<cac:LegalMonetaryTotal>\
             <cbc:TaxExclusiveAmount currencyID=\"EUR\">1000</cbc:TaxExclusiveAmount>\
             <cbc:PayableAmount currencyID=\"EUR\">1210</cbc:PayableAmount>\
             </cac:LegalMonetaryTotal></cac:AwardedTenderedProject></cac:TenderResult>",
        );
        xml
    }
}

/// An explicit lot block.
#[derive(Debug, Clone)]
pub struct TestLot {
    id: String,
    cpvs: Vec<String>,
}

impl TestLot {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            cpvs: vec!["34110000".into()],
        }
    }

    fn render(&self) -> String {
        format!(
            "<cac:ProcurementProjectLot><cbc:ID schemeName=\"ID_LOTE\">{id}</cbc:ID>\
             <cac:ProcurementProject><cbc:Name>Lot {id}</cbc:Name>\
             <cac:BudgetAmount><cbc:TotalAmount currencyID=\"EUR\">1210</cbc:TotalAmount>\
             <cbc:TaxExclusiveAmount currencyID=\"EUR\">1000</cbc:TaxExclusiveAmount></cac:BudgetAmount>\
             {cpvs}</cac:ProcurementProject></cac:ProcurementProjectLot>",
            id = self.id,
            cpvs = render_cpvs(&self.cpvs),
        )
    }
}

fn render_cpvs(cpvs: &[String]) -> String {
    cpvs.iter()
        .map(|cpv| {
            format!(
                "<cac:RequiredCommodityClassification>\
                 <cbc:ItemClassificationCode listURI=\"CPV2008\">{cpv}</cbc:ItemClassificationCode>\
                 </cac:RequiredCommodityClassification>"
            )
        })
        .collect()
}

/// One feed entry.
#[derive(Debug, Clone)]
pub struct TestEntry {
    id: String,
    updated: String,
    status: Option<String>,
    title: String,
    cpvs: Vec<String>,
    party: Option<String>,
    lots: Vec<TestLot>,
    results: Vec<TestResult>,
    documents: Vec<(String, String, String)>,
    notices: Vec<(String, Vec<String>)>,
}

impl TestEntry {
    pub fn new(id: &str, updated: &str) -> Self {
        Self {
            id: id.into(),
            updated: updated.into(),
            status: None,
            title: format!("Licitation {id}"),
            cpvs: Vec::new(),
            party: None,
            lots: Vec::new(),
            results: Vec::new(),
            documents: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn updated(mut self, updated: &str) -> Self {
        self.updated = updated.into();
        self
    }

    pub fn status(mut self, code: &str) -> Self {
        self.status = Some(code.into());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    pub fn cpvs(mut self, cpvs: &[&str]) -> Self {
        self.cpvs = cpvs.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn party(mut self, nif: &str) -> Self {
        self.party = Some(nif.into());
        self
    }

    pub fn lot(mut self, lot: TestLot) -> Self {
        self.lots.push(lot);
        self
    }

    pub fn result(mut self, result: TestResult) -> Self {
        self.results.push(result);
        self
    }

    pub fn clear_results(mut self) -> Self {
        self.results.clear();
        self
    }

    /// `kind` is one of `legal`, `technical`, `additional`, `general`.
    pub fn document(mut self, kind: &str, id: &str, url: &str) -> Self {
        self.documents.push((kind.into(), id.into(), url.into()));
        self
    }

    pub fn notice(mut self, code: &str, issue_dates: &[&str]) -> Self {
        self.notices.push((
            code.into(),
            issue_dates.iter().map(|d| d.to_string()).collect(),
        ));
        self
    }

    fn render(&self) -> String {
        let mut xml = String::from("<entry>");
        xml.push_str(&format!("<id>{}</id>", escape(self.id.as_str())));
        xml.push_str(&format!(
            r#"<link href="https://contratos.example.org/detalle?id={}"/>"#,
            escape(self.id.as_str())
        ));
        xml.push_str(&format!(
            r#"<summary type="text">{}</summary>"#,
            escape(self.title.as_str())
        ));
        xml.push_str(&format!("<title>{}</title>", escape(self.title.as_str())));
        xml.push_str(&format!("<updated>{}</updated>", self.updated));
        xml.push_str("<cac-place-ext:ContractFolderStatus>");

        if let Some(status) = &self.status {
            xml.push_str(&format!(
                "<cbc-place-ext:ContractFolderStatusCode listURI=\"SyndicationContractFolderStatusCode\">{status}</cbc-place-ext:ContractFolderStatusCode>"
            ));
        }
        if let Some(nif) = &self.party {
            xml.push_str(&render_party(nif));
        }

        xml.push_str(&format!(
            "<cac:ProcurementProject><cbc:Name>{title}</cbc:Name>\
             <cbc:TypeCode listURI=\"ContractCode\">2</cbc:TypeCode>\
             <cac:BudgetAmount>\
             <cbc:EstimatedOverallContractAmount currencyID=\"EUR\">1000</cbc:EstimatedOverallContractAmount>\
             <cbc:TotalAmount currencyID=\"EUR\">1210</cbc:TotalAmount>\
             <cbc:TaxExclusiveAmount currencyID=\"EUR\">1000</cbc:TaxExclusiveAmount>\
             </cac:BudgetAmount>{cpvs}\
             <cac:RealizedLocation><cbc:CountrySubentity>Valencia/València</cbc:CountrySubentity>\
             <cac:Address><cbc:CityName>Valencia</cbc:CityName><cbc:PostalZone>46002</cbc:PostalZone>\
             <cac:Country><cbc:IdentificationCode>ES</cbc:IdentificationCode></cac:Country></cac:Address>\
             </cac:RealizedLocation>\
             <cac:PlannedPeriod><cbc:DurationMeasure unitCode=\"MON\">12</cbc:DurationMeasure></cac:PlannedPeriod>\
             </cac:ProcurementProject>",
            title = escape(self.title.as_str()),
            cpvs = render_cpvs(&self.cpvs),
        ));

        for lot in &self.lots {
            xml.push_str(&lot.render());
        }
        for result in &self.results {
            xml.push_str(&result.render());
        }

        xml.push_str(
            "<cac:TenderingProcess><cbc:ProcedureCode>1</cbc:ProcedureCode>\
             <cbc:UrgencyCode>1</cbc:UrgencyCode>\
             <cbc:OverThresholdIndicator>false</cbc:OverThresholdIndicator>\
             <cac:TenderSubmissionDeadlinePeriod><cbc:EndDate>2025-04-10</cbc:EndDate>\
             <cbc:EndTime>23:59:00</cbc:EndTime></cac:TenderSubmissionDeadlinePeriod>\
             </cac:TenderingProcess>",
        );

        for (kind, id, url) in &self.documents {
            let reference = format!(
                "<cbc:ID>{}</cbc:ID><cac:Attachment><cac:ExternalReference><cbc:URI>{}</cbc:URI>\
                 </cac:ExternalReference></cac:Attachment>",
                escape(id.as_str()),
                escape(url.as_str())
            );
            let block = match kind.as_str() {
                "legal" => format!("<cac:LegalDocumentReference>{reference}</cac:LegalDocumentReference>"),
                "technical" => format!(
                    "<cac:TechnicalDocumentReference>{reference}</cac:TechnicalDocumentReference>"
                ),
                "general" => format!(
                    "<cac-place-ext:GeneralDocument><cac-place-ext:GeneralDocumentDocumentReference>\
                     {reference}</cac-place-ext:GeneralDocumentDocumentReference></cac-place-ext:GeneralDocument>"
                ),
                _ => format!(
                    "<cac:AdditionalDocumentReference>{reference}</cac:AdditionalDocumentReference>"
                ),
            };
            xml.push_str(&block);
        }

        for (code, dates) in &self.notices {
            xml.push_str(&format!(
                "<cac-place-ext:ValidNoticeInfo>\
                 <cbc-place-ext:NoticeTypeCode listURI=\"TenderingNoticeTypeCode\">{code}</cbc-place-ext:NoticeTypeCode>\
                 <cac-place-ext:AdditionalPublicationStatus>\
                 <cbc-place-ext:PublicationMediaName>Perfil del Contratante</cbc-place-ext:PublicationMediaName>"
            ));
            for date in dates {
                xml.push_str(&format!(
                    "<cac-place-ext:AdditionalPublicationDocumentReference>\
                     <cbc:IssueDate>{date}</cbc:IssueDate>\
                     </cac-place-ext:AdditionalPublicationDocumentReference>"
                ));
            }
            xml.push_str("</cac-place-ext:AdditionalPublicationStatus></cac-place-ext:ValidNoticeInfo>");
        }

        xml.push_str("</cac-place-ext:ContractFolderStatus></entry>\n");
        xml
    }
}

fn render_party(nif: &str) -> String {
    format!(
        "<cac-place-ext:LocatedContractingParty>\
         <cbc:BuyerProfileURIID>https://contratos.example.org/perfil/{nif}</cbc:BuyerProfileURIID>\
         <cac:Party>\
         <cbc:WebsiteURI>https://www.valencia.es</cbc:WebsiteURI>\
         <cac:PartyIdentification><cbc:ID schemeName=\"DIR3\">L01461335</cbc:ID></cac:PartyIdentification>\
         <cac:PartyIdentification><cbc:ID schemeName=\"NIF\">{nif}</cbc:ID></cac:PartyIdentification>\
         <cac:PartyName><cbc:Name>Ayuntamiento de Valencia</cbc:Name></cac:PartyName>\
         <cac:PostalAddress><cbc:CityName>Valencia</cbc:CityName><cbc:PostalZone>46002</cbc:PostalZone>\
         <cac:AddressLine><cbc:Line>Plaza del Ayuntamiento 1</cbc:Line></cac:AddressLine>\
         <cac:Country><cbc:IdentificationCode>ES</cbc:IdentificationCode><cbc:Name>España</cbc:Name></cac:Country>\
         </cac:PostalAddress>\
         <cac:Contact><cbc:Telephone>963525478</cbc:Telephone>\
         <cbc:ElectronicMail>contratacion@valencia.es</cbc:ElectronicMail></cac:Contact>\
         </cac:Party></cac-place-ext:LocatedContractingParty>"
    )
}

/// Serves pages from a map keyed by URL and records every request.
#[derive(Debug, Default)]
pub struct MapFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    /// Make requests for `url` fail with a transport error.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AtomFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(AppError::feed(url, "connection reset"));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::feed(url, "404 Not Found"))
    }
}
