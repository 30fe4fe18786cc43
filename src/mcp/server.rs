use std::fmt::Write as _;

use chrono::NaiveDate;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router,
};

use crate::domain::dates::parse_date_key;
use crate::domain::peak_season::{ChangeType, PeakSeasonDraft};
use crate::engine::availability_service::{AvailabilityService, SearchRequest, SetAvailability};
use crate::engine::change_applier::AppliedChange;
use crate::engine::peak_season_service::{PeakSeasonService, SeasonChangeOutcome};
use crate::error::PricingError;

const DEFAULT_CALENDAR_DAYS: u32 = 30;

// ---------- Tool parameter types ----------

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct QuoteNightToolParams {
    /// Room ID
    pub room_id: String,
    /// Night to price (YYYY-MM-DD)
    pub date: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StayToolParams {
    /// Room ID
    pub room_id: String,
    /// First night of the stay (YYYY-MM-DD)
    pub check_in: String,
    /// Departure day (YYYY-MM-DD). This night is not charged.
    pub check_out: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SearchToolParams {
    /// Tenant whose properties are searched
    pub tenant_id: String,
    /// Restrict the search to these property IDs (default: every tenant property)
    pub property_ids: Option<Vec<String>>,
    /// Check-in date (YYYY-MM-DD)
    pub check_in: String,
    /// Check-out date (YYYY-MM-DD)
    pub check_out: String,
    /// Number of guests; rooms with a smaller capacity are skipped
    pub guests: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct CalendarToolParams {
    /// Room ID
    pub room_id: String,
    /// First day of the calendar (YYYY-MM-DD)
    pub from: String,
    /// Number of days to show (default: 30)
    pub days: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SetAvailabilityToolParams {
    /// Room ID
    pub room_id: String,
    /// Day to edit (YYYY-MM-DD)
    pub date: String,
    #[serde(flatten)]
    pub changes: SetAvailability,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct TenantToolParams {
    /// Tenant ID
    pub tenant_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SeasonFields {
    /// Display name, also used in the reason shown on affected days
    pub name: String,
    /// First day of the season (YYYY-MM-DD, inclusive)
    pub start_date: String,
    /// Last day of the season (YYYY-MM-DD, inclusive)
    pub end_date: String,
    /// "percentage" or "nominal"
    pub change_type: ChangeType,
    /// Percent (e.g. 20 for +20%) or absolute amount (e.g. -15)
    pub change_value: f64,
    /// Apply to every property of the tenant (default: false)
    pub apply_to_all_properties: Option<bool>,
    /// Property IDs the season applies to when not global
    pub property_ids: Option<Vec<String>>,
}

impl SeasonFields {
    fn into_draft(self) -> Result<PeakSeasonDraft, String> {
        Ok(PeakSeasonDraft {
            name: self.name,
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            change_type: self.change_type,
            change_value: self.change_value,
            apply_to_all_properties: self.apply_to_all_properties.unwrap_or(false),
            property_ids: self.property_ids.unwrap_or_default(),
        })
    }
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct CreateSeasonToolParams {
    /// Tenant that owns the season
    pub tenant_id: String,
    #[serde(flatten)]
    pub season: SeasonFields,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct UpdateSeasonToolParams {
    /// Tenant that owns the season
    pub tenant_id: String,
    /// ID of the season to replace
    pub season_id: String,
    #[serde(flatten)]
    pub season: SeasonFields,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DeleteSeasonToolParams {
    /// Tenant that owns the season
    pub tenant_id: String,
    /// ID of the season to delete
    pub season_id: String,
}

// ---------- Helpers ----------

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_date_key(value).map_err(|e| e.to_string())
}

fn parse_stay(check_in: &str, check_out: &str) -> Result<(NaiveDate, NaiveDate), String> {
    Ok((parse_date(check_in)?, parse_date(check_out)?))
}

fn error_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

fn failure(action: &str, e: &PricingError) -> CallToolResult {
    let hint = match e {
        PricingError::Validation { .. } => " Check the arguments and try again.",
        PricingError::NotFound { .. } => " Verify the ID belongs to this tenant.",
        _ => "",
    };
    error_result(format!("Failed to {action}: {e}.{hint}"))
}

fn describe_outcome(verb: &str, outcome: &SeasonChangeOutcome) -> String {
    let mut text = format!("{verb} peak season {}\n", outcome.season);
    describe_applied(&mut text, &outcome.applied);
    if !outcome.overlapping.is_empty() {
        let _ = writeln!(
            text,
            "\nOverlaps with {} existing season(s); their changes stack:",
            outcome.overlapping.len()
        );
        for season in &outcome.overlapping {
            let _ = writeln!(text, "- {season}");
        }
    }
    text
}

fn describe_applied(text: &mut String, applied: &AppliedChange) {
    let _ = writeln!(
        text,
        "Recomputed {} day(s) across {} room(s) in {} propert(ies), window {}.",
        applied.rows_upserted,
        applied.affected_room_count,
        applied.affected_property_ids.len(),
        applied.window
    );
}

// ---------- MCP Server ----------

#[derive(Clone)]
pub struct PricingMcpServer {
    availability: AvailabilityService,
    seasons: PeakSeasonService,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PricingMcpServer {
    pub fn new(availability: AvailabilityService, seasons: PeakSeasonService) -> Self {
        Self {
            availability,
            seasons,
            tool_router: Self::tool_router(),
        }
    }

    /// Price one room for one night, step by step.
    #[tool(
        name = "pricing_quote_night",
        description = "Price a room for a single night and show how the price was built: base price, manual modifier, peak season percentages and amounts, or a fixed custom price. Use this to explain a price.",
        annotations(read_only_hint = true)
    )]
    async fn pricing_quote_night(
        &self,
        Parameters(params): Parameters<QuoteNightToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let date = match parse_date(&params.date) {
            Ok(date) => date,
            Err(e) => return Ok(error_result(e)),
        };
        match self.availability.price_breakdown(&params.room_id, date).await {
            Ok(breakdown) => {
                let text = format!("Room {} on {}:\n{breakdown}", params.room_id, params.date);
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("price the night", &e)),
        }
    }

    /// Check whether a room can be booked for every night of a stay.
    #[tool(
        name = "pricing_check_stay",
        description = "Check whether a room is free for every night from check-in up to (not including) check-out, and return its lowest nightly price in that range.",
        annotations(read_only_hint = true)
    )]
    async fn pricing_check_stay(
        &self,
        Parameters(params): Parameters<StayToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let (check_in, check_out) = match parse_stay(&params.check_in, &params.check_out) {
            Ok(dates) => dates,
            Err(e) => return Ok(error_result(e)),
        };
        match self
            .availability
            .check_stay(&params.room_id, check_in, check_out)
            .await
        {
            Ok(result) if result.is_bookable() => Ok(CallToolResult::success(vec![Content::text(
                format!(
                    "Room {} is available from {} to {}: from {}/night ({} night(s) priced).",
                    params.room_id,
                    params.check_in,
                    params.check_out,
                    result.min_price,
                    result.priced_days
                ),
            )])),
            Ok(_) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Room {} is not available from {} to {}.",
                params.room_id, params.check_in, params.check_out
            ))])),
            Err(e) => Ok(failure("check the stay", &e)),
        }
    }

    /// Nightly prices and total for a stay.
    #[tool(
        name = "pricing_quote_stay",
        description = "Quote a stay: the price of each night from check-in up to (not including) check-out, and the total. Fails if any night is unavailable.",
        annotations(read_only_hint = true)
    )]
    async fn pricing_quote_stay(
        &self,
        Parameters(params): Parameters<StayToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let (check_in, check_out) = match parse_stay(&params.check_in, &params.check_out) {
            Ok(dates) => dates,
            Err(e) => return Ok(error_result(e)),
        };
        match self
            .availability
            .quote_stay(&params.room_id, check_in, check_out)
            .await
        {
            Ok(quote) => Ok(CallToolResult::success(vec![Content::text(quote.to_string())])),
            Err(e) => Ok(failure("quote the stay", &e)),
        }
    }

    /// Properties with a bookable room for the stay, cheapest first.
    #[tool(
        name = "pricing_search",
        description = "Find a tenant's properties that have at least one room free for the whole stay, with each property's lowest nightly ('from') price. Optionally filter by guest count and property IDs.",
        annotations(read_only_hint = true)
    )]
    async fn pricing_search(
        &self,
        Parameters(params): Parameters<SearchToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let (check_in, check_out) = match parse_stay(&params.check_in, &params.check_out) {
            Ok(dates) => dates,
            Err(e) => return Ok(error_result(e)),
        };
        let request = SearchRequest {
            tenant_id: params.tenant_id,
            property_ids: params.property_ids.unwrap_or_default(),
            check_in,
            check_out,
            guests: params.guests,
        };
        match self.availability.search(&request).await {
            Ok(offers) if offers.is_empty() => Ok(CallToolResult::success(vec![Content::text(
                "No available properties for this stay.",
            )])),
            Ok(offers) => {
                let mut text = format!("Found {} available properties:\n", offers.len());
                for (i, offer) in offers.iter().enumerate() {
                    let _ = writeln!(text, "{}. {offer}", i + 1);
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("search availability", &e)),
        }
    }

    /// Day-by-day price and availability of a room.
    #[tool(
        name = "pricing_room_calendar",
        description = "Show a room's price and availability for each day starting at 'from' (default 30 days), with average, min and max price and occupancy.",
        annotations(read_only_hint = true)
    )]
    async fn pricing_room_calendar(
        &self,
        Parameters(params): Parameters<CalendarToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let from = match parse_date(&params.from) {
            Ok(date) => date,
            Err(e) => return Ok(error_result(e)),
        };
        let days = params.days.unwrap_or(DEFAULT_CALENDAR_DAYS);
        match self.availability.room_calendar(&params.room_id, from, days).await {
            Ok(calendar) => Ok(CallToolResult::success(vec![Content::text(calendar.to_string())])),
            Err(e) => Ok(failure("build the calendar", &e)),
        }
    }

    /// Open/close a day or set its manual price.
    #[tool(
        name = "pricing_set_availability",
        description = "Edit one room on one day: open or close it, set or clear a fixed custom price, set or clear a price modifier, and record a reason. Bookings on the day are never changed.",
        annotations(read_only_hint = false, destructive_hint = false, idempotent_hint = true)
    )]
    async fn pricing_set_availability(
        &self,
        Parameters(params): Parameters<SetAvailabilityToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let date = match parse_date(&params.date) {
            Ok(date) => date,
            Err(e) => return Ok(error_result(e)),
        };
        match self
            .availability
            .set_availability(&params.room_id, date, params.changes)
            .await
        {
            Ok(row) => {
                let mut text = format!("Updated room {} on {}:\n", row.room_id, params.date);
                let _ = writeln!(text, "Available: {}", if row.is_available { "yes" } else { "no" });
                let _ = writeln!(text, "Booked units: {}/{}", row.booked_units, row.total_units);
                if let Some(price) = row.custom_price {
                    let _ = writeln!(text, "Custom price: {price}");
                }
                if let Some(modifier) = row.price_modifier {
                    let _ = writeln!(text, "Price modifier: {modifier:+}");
                }
                if let Some(reason) = &row.reason {
                    let _ = writeln!(text, "Reason: {reason}");
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("update availability", &e)),
        }
    }

    /// List a tenant's peak seasons.
    #[tool(
        name = "peak_season_list",
        description = "List a tenant's peak seasons ordered by start date, with their date range, price change and property scope.",
        annotations(read_only_hint = true)
    )]
    async fn peak_season_list(
        &self,
        Parameters(params): Parameters<TenantToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.seasons.list(&params.tenant_id).await {
            Ok(seasons) if seasons.is_empty() => Ok(CallToolResult::success(vec![Content::text(
                format!("Tenant {} has no peak seasons.", params.tenant_id),
            )])),
            Ok(seasons) => {
                let mut text = format!("{} peak season(s):\n", seasons.len());
                for season in &seasons {
                    let _ = writeln!(text, "- {season}");
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("list peak seasons", &e)),
        }
    }

    /// Create a peak season and reprice the affected days.
    #[tool(
        name = "peak_season_create",
        description = "Create a peak season that raises or lowers prices by a percentage or a fixed amount over a date range, for all or selected properties, and reprice every affected room day. Overlapping seasons are allowed and stack; they are listed in the response.",
        annotations(read_only_hint = false, destructive_hint = false)
    )]
    async fn peak_season_create(
        &self,
        Parameters(params): Parameters<CreateSeasonToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let draft = match params.season.into_draft() {
            Ok(draft) => draft,
            Err(e) => return Ok(error_result(e)),
        };
        match self.seasons.create(&params.tenant_id, draft).await {
            Ok(outcome) => Ok(CallToolResult::success(vec![Content::text(
                describe_outcome("Created", &outcome),
            )])),
            Err(e) => Ok(failure("create the peak season", &e)),
        }
    }

    /// Replace a peak season and reprice old and new days.
    #[tool(
        name = "peak_season_update",
        description = "Replace an existing peak season. Days covered by the old or the new definition are repriced, so days it no longer covers return to their normal price.",
        annotations(read_only_hint = false, destructive_hint = false, idempotent_hint = true)
    )]
    async fn peak_season_update(
        &self,
        Parameters(params): Parameters<UpdateSeasonToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let draft = match params.season.into_draft() {
            Ok(draft) => draft,
            Err(e) => return Ok(error_result(e)),
        };
        match self
            .seasons
            .update(&params.tenant_id, &params.season_id, draft)
            .await
        {
            Ok(outcome) => Ok(CallToolResult::success(vec![Content::text(
                describe_outcome("Updated", &outcome),
            )])),
            Err(e) => Ok(failure("update the peak season", &e)),
        }
    }

    /// Delete a peak season and restore normal prices.
    #[tool(
        name = "peak_season_delete",
        description = "Delete a peak season and reprice the days it covered. Other seasons on those days stay in effect.",
        annotations(read_only_hint = false, destructive_hint = true, idempotent_hint = false)
    )]
    async fn peak_season_delete(
        &self,
        Parameters(params): Parameters<DeleteSeasonToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .seasons
            .delete(&params.tenant_id, &params.season_id)
            .await
        {
            Ok(applied) => {
                let mut text = format!("Deleted peak season {}.\n", params.season_id);
                describe_applied(&mut text, &applied);
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("delete the peak season", &e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for PricingMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Dynamic pricing and availability server for multi-tenant lodging.\n\
                 \n\
                 ## Prices\n\
                 A night's price is a fixed custom price when one is set; otherwise the room's base price \
                 plus its modifier, then every active peak season percentage (summed), then every active \
                 nominal amount. Prices are whole numbers and never negative.\n\
                 - pricing_quote_night: explain one night's price step by step\n\
                 - pricing_check_stay: is a room free for a stay, and its lowest nightly price\n\
                 - pricing_quote_stay: nightly prices and total for a stay\n\
                 - pricing_search: properties with a free room for a stay, cheapest first\n\
                 - pricing_room_calendar: day-by-day prices and availability\n\
                 - pricing_set_availability: open/close a day or set a manual price\n\
                 \n\
                 ## Peak seasons\n\
                 - peak_season_list / peak_season_create / peak_season_update / peak_season_delete\n\
                 Creating, changing or deleting a season reprices every affected room day. Overlapping \
                 seasons are allowed and their changes add up.\n\
                 \n\
                 ## Dates\n\
                 All dates are calendar days in YYYY-MM-DD format. Stays cover check-in up to, not \
                 including, check-out."
                    .into(),
            ),
        }
    }
}
