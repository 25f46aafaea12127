// src/feed/mapper.rs

//! Feed page to parsed entry mapping.
//!
//! Translates one decoded ATOM page into [`ParsedEntry`] values and deletion
//! markers. Each entry embeds a `ContractFolderStatus` extension block that
//! carries the contracting party, procurement project, lots, tender results,
//! documents and publication notices.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    DocumentKind, LicitationFields, LotFields, NO_LOT_ID, NoticeDocument, ParsedDeletedEntry,
    ParsedDocument, ParsedEntry, ParsedLot, ParsedNotice, ParsedParty, PartyFields,
    PublicationRequest, TenderResult, lot_ext_id,
};
use crate::utils::time::parse_instant;

use super::tree::{NULL, amount_at, as_list, attr, find_by_attr, int_at, path, text, text_at};
use super::xml;

const CONTRACT_FOLDER: &str = "cac-place-ext:ContractFolderStatus";

/// Notice codes tried, in order, when resolving the publication date.
const PUBLICATION_NOTICE_PRIORITY: [&str; 3] = ["DOC_CN", "DOC_PIN", "DOC_CAN_ADJ"];

/// One decoded feed page.
#[derive(Debug)]
pub struct FeedPage {
    /// Feed-level `updated` timestamp
    pub updated: DateTime<Utc>,

    /// Raw `href` of the `rel="next"` link, absent on the last page
    pub next: Option<String>,

    /// Entries in page order; a malformed entry fails on its own
    pub entries: Vec<Result<ParsedEntry>>,

    pub deleted: Vec<ParsedDeletedEntry>,
}

/// Decode raw page markup and map it.
pub fn decode_page(raw: &str) -> Result<FeedPage> {
    let tree = xml::decode(raw)?;
    map_page(&tree)
}

/// Map an already decoded page tree.
pub fn map_page(root: &Value) -> Result<FeedPage> {
    let feed = feed_of(root);
    let updated = text(feed.get("updated"))
        .as_deref()
        .and_then(parse_instant)
        .ok_or_else(|| AppError::xml("feed has no valid updated timestamp"))?;

    Ok(FeedPage {
        updated,
        next: next_link(root),
        entries: parse_entries(root),
        deleted: parse_deleted_entries(root),
    })
}

fn feed_of(root: &Value) -> &Value {
    root.get("feed").unwrap_or(root)
}

/// The page's `rel="next"` link target.
pub fn next_link(root: &Value) -> Option<String> {
    as_list(feed_of(root).get("link"))
        .into_iter()
        .find(|link| attr(link, "rel").as_deref() == Some("next"))
        .and_then(|link| attr(link, "href"))
}

/// Map every `entry` of the page.
pub fn parse_entries(root: &Value) -> Vec<Result<ParsedEntry>> {
    as_list(feed_of(root).get("entry"))
        .into_iter()
        .map(map_entry)
        .collect()
}

/// Reduce `at:deleted-entry` markers; markers without a `ref` are dropped.
pub fn parse_deleted_entries(root: &Value) -> Vec<ParsedDeletedEntry> {
    as_list(feed_of(root).get("at:deleted-entry"))
        .into_iter()
        .filter_map(|marker| {
            let entry_id = attr(marker, "ref")?;
            let deleted_at = attr(marker, "when").as_deref().and_then(parse_instant);
            let reason = path(marker, &["at:comment"])
                .filter(|comment| comment.is_object())
                .and_then(|comment| attr(comment, "type"));
            Some(ParsedDeletedEntry {
                entry_id,
                deleted_at,
                reason,
            })
        })
        .collect()
}

/// Map one `entry` node. Only the id and `updated` timestamp are required.
pub fn map_entry(entry: &Value) -> Result<ParsedEntry> {
    let entry_id = text(entry.get("id"))
        .ok_or_else(|| AppError::malformed("<unknown>", "entry has no id"))?;
    let updated = text(entry.get("updated"))
        .as_deref()
        .and_then(parse_instant)
        .ok_or_else(|| AppError::malformed(&entry_id, "missing or invalid updated timestamp"))?;

    let cfs = entry.get(CONTRACT_FOLDER).unwrap_or(&NULL);
    let project = collect_procurement(path(cfs, &["cac:ProcurementProject"]));
    let tender_results: Vec<(String, TenderResult)> = as_list(cfs.get("cac:TenderResult"))
        .into_iter()
        .map(collect_tender_result)
        .collect();

    let mut fields = LicitationFields {
        status_code: text_at(cfs, &["cbc-place-ext:ContractFolderStatusCode"]),
        title: text(entry.get("title")),
        summary: text(entry.get("summary")),
        platform_url: as_list(entry.get("link"))
            .first()
            .and_then(|link| attr(link, "href")),
        type_code: project.type_code,
        subtype_code: project.subtype_code,
        estimated_overall_cost: project.estimated_overall_cost,
        cost_with_taxes: project.cost_with_taxes,
        cost_without_taxes: project.cost_without_taxes,
        cpvs: project.cpvs.clone(),
        place: project.place.clone(),
        realized_city: project.city.clone(),
        realized_zip: project.zip.clone(),
        realized_country: project.country.clone(),
        estimated_duration: project.duration.clone(),
        ..LicitationFields::default()
    };
    collect_tendering_process(cfs, &mut fields);

    let lot_blocks = as_list(cfs.get("cac:ProcurementProjectLot"));
    let (lots, lots_adj) = if lot_blocks.is_empty() {
        let (lot, result, lots_adj) = synthetic_lot(&entry_id, &project, tender_results);
        fields.result = result;
        (vec![lot], lots_adj)
    } else {
        explicit_lots(&entry_id, &lot_blocks, &tender_results)
    };

    let notices = collect_notices(cfs);
    fields.published_date = published_date(&notices);

    Ok(ParsedEntry {
        party: collect_party(cfs, updated),
        entry_id,
        updated,
        fields,
        lots,
        lots_adj,
        documents: collect_documents(cfs),
        notices,
    })
}

/// Contracting authority; absent when no NIF-identified party is published.
fn collect_party(cfs: &Value, updated: DateTime<Utc>) -> Option<ParsedParty> {
    let located = path(cfs, &["cac-place-ext:LocatedContractingParty"])?;
    let party = path(located, &["cac:Party"]).unwrap_or(&NULL);
    let identifications = as_list(party.get("cac:PartyIdentification"));

    let nif = text(find_by_attr(&identifications, "cbc:ID", "schemeName", "NIF"))?;
    let dir3 = text(find_by_attr(&identifications, "cbc:ID", "schemeName", "DIR3"));

    Some(ParsedParty {
        nif,
        updated,
        fields: PartyFields {
            profile_url: text_at(located, &["cbc:BuyerProfileURIID"]),
            website: text_at(party, &["cbc:WebsiteURI"]),
            dir3,
            name: text_at(party, &["cac:PartyName", "cbc:Name"]),
            address: text_at(party, &["cac:PostalAddress", "cac:AddressLine", "cbc:Line"]),
            zip: text_at(party, &["cac:PostalAddress", "cbc:PostalZone"]),
            city: text_at(party, &["cac:PostalAddress", "cbc:CityName"]),
            country_code: text_at(
                party,
                &["cac:PostalAddress", "cac:Country", "cbc:IdentificationCode"],
            ),
            country: text_at(party, &["cac:PostalAddress", "cac:Country", "cbc:Name"]),
            phone: text_at(party, &["cac:Contact", "cbc:Telephone"]),
            email: text_at(party, &["cac:Contact", "cbc:ElectronicMail"]),
        },
    })
}

/// Procurement project block, read the same way for licitations and lots.
#[derive(Debug, Default)]
struct Procurement {
    type_code: Option<u32>,
    subtype_code: Option<u32>,
    estimated_overall_cost: Option<f64>,
    cost_with_taxes: Option<f64>,
    cost_without_taxes: Option<f64>,
    cpvs: Vec<String>,
    place: Option<String>,
    city: Option<String>,
    zip: Option<String>,
    country: Option<String>,
    duration: Option<String>,
    name: Option<String>,
}

impl Procurement {
    fn lot_fields(&self, result: TenderResult) -> LotFields {
        LotFields {
            name: self.name.clone(),
            cost_with_taxes: self.cost_with_taxes,
            cost_without_taxes: self.cost_without_taxes,
            cpvs: self.cpvs.clone(),
            place: self.place.clone(),
            city: self.city.clone(),
            zip: self.zip.clone(),
            country: self.country.clone(),
            result,
        }
    }
}

fn collect_procurement(project: Option<&Value>) -> Procurement {
    let Some(project) = project else {
        return Procurement::default();
    };
    let budget = path(project, &["cac:BudgetAmount"]).unwrap_or(&NULL);
    let location = path(project, &["cac:RealizedLocation"]).unwrap_or(&NULL);

    let cpvs = as_list(project.get("cac:RequiredCommodityClassification"))
        .into_iter()
        .filter_map(|class| text_at(class, &["cbc:ItemClassificationCode"]))
        .collect();

    let duration = path(project, &["cac:PlannedPeriod", "cbc:DurationMeasure"]).and_then(|d| {
        let joined = format!(
            "{} {}",
            text(Some(d)).unwrap_or_default(),
            attr(d, "unitCode").unwrap_or_default()
        );
        let joined = joined.trim();
        (!joined.is_empty()).then(|| joined.to_string())
    });

    Procurement {
        type_code: int_at(project, &["cbc:TypeCode"]),
        subtype_code: int_at(project, &["cbc:SubTypeCode"]),
        estimated_overall_cost: amount_at(budget, &["cbc:EstimatedOverallContractAmount"]),
        cost_with_taxes: amount_at(budget, &["cbc:TotalAmount"]),
        cost_without_taxes: amount_at(budget, &["cbc:TaxExclusiveAmount"]),
        cpvs,
        place: text_at(location, &["cbc:CountrySubentity"]),
        city: text_at(location, &["cac:Address", "cbc:CityName"]),
        zip: text_at(location, &["cac:Address", "cbc:PostalZone"]),
        country: text_at(
            location,
            &["cac:Address", "cac:Country", "cbc:IdentificationCode"],
        ),
        duration,
        name: text_at(project, &["cbc:Name"]),
    }
}

/// Normalize a lot id so that `"01"` and `"1"` match.
fn normalize_lot_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// One tender result and the lot id it refers to (`"0"` when unstated).
fn collect_tender_result(raw: &Value) -> (String, TenderResult) {
    let winner = path(raw, &["cac:WinningParty"]).unwrap_or(&NULL);
    let address = path(winner, &["cac:PhysicalLocation", "cac:Address"]).unwrap_or(&NULL);
    let awarded = path(raw, &["cac:AwardedTenderedProject"]).unwrap_or(&NULL);

    let lot_id = text_at(awarded, &["cbc:ProcurementProjectLotID"])
        .map(|id| normalize_lot_id(&id))
        .unwrap_or_else(|| NO_LOT_ID.to_string());

    let result = TenderResult {
        result_code: int_at(raw, &["cbc:ResultCode"]),
        award_date: text_at(raw, &["cbc:AwardDate"]),
        received_tender_quantity: int_at(raw, &["cbc:ReceivedTenderQuantity"]),
        lower_tender_amount: amount_at(raw, &["cbc:LowerTenderAmount"]),
        higher_tender_amount: amount_at(raw, &["cbc:HigherTenderAmount"]),
        winning_nif: text_at(winner, &["cac:PartyIdentification", "cbc:ID"]),
        winning_name: text_at(winner, &["cac:PartyName", "cbc:Name"]),
        winning_city: text_at(address, &["cbc:CityName"]),
        winning_zip: text_at(address, &["cbc:PostalZone"]),
        winning_country: text_at(address, &["cac:Country", "cbc:IdentificationCode"]),
        award_tax_exclusive: amount_at(awarded, &["cac:LegalMonetaryTotal", "cbc:TaxExclusiveAmount"]),
        award_payable_amount: amount_at(awarded, &["cac:LegalMonetaryTotal", "cbc:PayableAmount"]),
    };
    (lot_id, result)
}

/// Lots published explicitly. A lot counts toward the award counter when a
/// tender result refers to it, unless that result says the lot was desisted.
fn explicit_lots(
    entry_id: &str,
    blocks: &[&Value],
    results: &[(String, TenderResult)],
) -> (Vec<ParsedLot>, u32) {
    let mut lots_adj = 0;
    let lots = blocks
        .iter()
        .map(|block| {
            let lot_id = text_at(block, &["cbc:ID"])
                .map(|id| normalize_lot_id(&id))
                .unwrap_or_else(|| NO_LOT_ID.to_string());
            let project = collect_procurement(path(block, &["cac:ProcurementProject"]));

            let result = match results.iter().find(|(id, _)| *id == lot_id) {
                Some((_, result)) => {
                    if !result.is_desisted() {
                        lots_adj += 1;
                    }
                    result.clone()
                }
                None => TenderResult::default(),
            };

            ParsedLot {
                ext_id: lot_ext_id(&lot_id, entry_id),
                fields: project.lot_fields(result),
                lot_id,
            }
        })
        .collect();
    (lots, lots_adj)
}

/// The whole licitation as lot `"0"`. A void result is reduced to its code
/// and never counts as awarded.
fn synthetic_lot(
    entry_id: &str,
    project: &Procurement,
    results: Vec<(String, TenderResult)>,
) -> (ParsedLot, TenderResult, u32) {
    let (result, lots_adj) = match results.into_iter().next() {
        Some((_, result)) if result.is_declared_void() => (result.code_only(), 0),
        Some((_, result)) => (result, 1),
        None => (TenderResult::default(), 0),
    };
    let lot = ParsedLot {
        lot_id: NO_LOT_ID.to_string(),
        ext_id: lot_ext_id(NO_LOT_ID, entry_id),
        fields: project.lot_fields(result.clone()),
    };
    (lot, result, lots_adj)
}

fn collect_tendering_process(cfs: &Value, fields: &mut LicitationFields) {
    let process = path(cfs, &["cac:TenderingProcess"]).unwrap_or(&NULL);
    fields.procedure_code = int_at(process, &["cbc:ProcedureCode"]);
    fields.urgency_code = int_at(process, &["cbc:UrgencyCode"]);
    fields.part_presentation_code = int_at(process, &["cbc:PartPresentationCode"]);
    fields.contracting_system_code = int_at(process, &["cbc:ContractingSystemCode"]);
    fields.submission_method_code = int_at(process, &["cbc:SubmissionMethodCode"]);
    fields.over_threshold_indicator = text_at(process, &["cbc:OverThresholdIndicator"])
        .and_then(|flag| match flag.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        });

    let deadline = path(process, &["cac:TenderSubmissionDeadlinePeriod"]).unwrap_or(&NULL);
    fields.submission_end_date = text_at(deadline, &["cbc:EndDate"]);
    fields.submission_end_time = text_at(deadline, &["cbc:EndTime"]);

    let availability = path(cfs, &["cac:DocumentAvailabilityPeriod"]).unwrap_or(&NULL);
    fields.availability_end_date = text_at(availability, &["cbc:EndDate"]);
    fields.availability_end_time = text_at(availability, &["cbc:EndTime"]);
}

fn pick_document(reference: Option<&Value>, kind: DocumentKind) -> Option<ParsedDocument> {
    let reference = reference?;
    Some(ParsedDocument {
        doc_id: text_at(reference, &["cbc:ID"])?,
        url: text_at(reference, &["cac:Attachment", "cac:ExternalReference", "cbc:URI"])?,
        kind,
    })
}

/// Legal, technical, additional then general documents, deduplicated by `(id, url)`.
fn collect_documents(cfs: &Value) -> Vec<ParsedDocument> {
    let direct = [
        ("cac:LegalDocumentReference", DocumentKind::Legal),
        ("cac:TechnicalDocumentReference", DocumentKind::Technical),
        ("cac:AdditionalDocumentReference", DocumentKind::Additional),
    ];

    let mut all: Vec<ParsedDocument> = direct
        .iter()
        .flat_map(|(key, kind)| {
            as_list(cfs.get(*key))
                .into_iter()
                .filter_map(move |reference| pick_document(Some(reference), *kind))
        })
        .collect();
    all.extend(
        as_list(cfs.get("cac-place-ext:GeneralDocument"))
            .into_iter()
            .filter_map(|general| {
                pick_document(
                    path(general, &["cac-place-ext:GeneralDocumentDocumentReference"]),
                    DocumentKind::General,
                )
            }),
    );

    let mut documents: Vec<ParsedDocument> = Vec::with_capacity(all.len());
    for doc in all {
        let seen = documents
            .iter()
            .any(|d| d.doc_id == doc.doc_id && d.url == doc.url);
        if !seen {
            documents.push(doc);
        }
    }
    documents
}

fn collect_notices(cfs: &Value) -> Vec<ParsedNotice> {
    as_list(cfs.get("cac-place-ext:ValidNoticeInfo"))
        .into_iter()
        .map(|notice| {
            let statuses = as_list(notice.get("cac-place-ext:AdditionalPublicationStatus"));

            let media = statuses
                .iter()
                .find_map(|s| text_at(s, &["cbc-place-ext:PublicationMediaName"]));
            let publication_request = statuses
                .iter()
                .find_map(|s| path(s, &["cac-place-ext:AdditionalPublicationRequest"]))
                .map(|req| PublicationRequest {
                    agency_id: text_at(req, &["cbc:AgencyID"]),
                    sent_date: text_at(req, &["cbc-place-ext:SendDate"]),
                    sent_time: text_at(req, &["cbc-place-ext:SendTime"]),
                });
            let documents = statuses
                .iter()
                .flat_map(|s| {
                    as_list(s.get("cac-place-ext:AdditionalPublicationDocumentReference"))
                })
                .map(|reference| {
                    let type_code = path(reference, &["cbc:DocumentTypeCode"]);
                    NoticeDocument {
                        issue_date: text_at(reference, &["cbc:IssueDate"]),
                        doc_type: text(type_code),
                        doc_name: type_code.and_then(|code| attr(code, "name")),
                        file_url: text_at(
                            reference,
                            &["cac:Attachment", "cac:ExternalReference", "cbc:URI"],
                        ),
                        file_name: text_at(
                            reference,
                            &["cac:Attachment", "cac:ExternalReference", "cbc:FileName"],
                        ),
                    }
                })
                .collect();

            ParsedNotice {
                code: text_at(notice, &["cbc-place-ext:NoticeTypeCode"]),
                media,
                publication_request,
                documents,
            }
        })
        .collect()
}

/// Earliest issue date of the first notice of the highest priority code
/// present. A notice of that code without dates leaves the date unset.
fn published_date(notices: &[ParsedNotice]) -> Option<String> {
    let notice = PUBLICATION_NOTICE_PRIORITY
        .iter()
        .find_map(|code| notices.iter().find(|n| n.code.as_deref() == Some(*code)))?;

    let dates: Vec<&String> = notice
        .documents
        .iter()
        .filter_map(|d| d.issue_date.as_ref())
        .collect();
    dates
        .iter()
        .filter_map(|raw| parse_instant(raw).map(|at| (at, *raw)))
        .min_by_key(|(at, _)| *at)
        .map(|(_, raw)| raw.clone())
        .or_else(|| dates.first().map(|raw| (*raw).clone()))
}
