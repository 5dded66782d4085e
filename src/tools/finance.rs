//! Financial data tools.
//!
//! Every tool is a variant of [`FinancialTool`]. A variant knows its name,
//! description, parameter schema and endpoint; validation and invocation are
//! shared and driven by the parameter table.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value, json};

use super::{ApiRequest, FinancialDataSource};
use crate::agent::tool::ToolDefinition;
use crate::error::ToolError;

static TICKER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9.\-]{0,9}$").ok());

const PERIODS: &[&str] = &["annual", "quarterly", "ttm"];
const ESTIMATE_PERIODS: &[&str] = &["annual", "quarterly"];
const INTERVALS: &[&str] = &["minute", "hour", "day", "week", "month"];
const FILING_TYPES: &[&str] = &["10-K", "10-Q", "8-K", "4", "144"];

/// Accepted shape of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    /// Uppercased symbol matching the ticker pattern.
    Ticker,
    /// `YYYY-MM-DD`.
    Date,
    /// One of a fixed set of strings.
    Choice(&'static [&'static str]),
    /// Integer greater than zero.
    PositiveInt,
    /// Integer in an inclusive range.
    IntRange(i64, i64),
    /// Non-empty free text.
    Text,
    /// Non-empty list of tickers.
    TickerList,
    /// Non-empty list of free-text items.
    TextList,
}

/// One declared parameter.
#[derive(Debug, Clone, Copy)]
struct Param {
    name: &'static str,
    kind: ParamKind,
    required: bool,
    default: Option<&'static str>,
    description: &'static str,
}

const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        kind,
        required: true,
        default: None,
        description,
    }
}

const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        kind,
        required: false,
        default: None,
        description,
    }
}

const fn defaulted(
    name: &'static str,
    kind: ParamKind,
    default: &'static str,
    description: &'static str,
) -> Param {
    Param {
        name,
        kind,
        required: false,
        default: Some(default),
        description,
    }
}

const TICKER: Param = required(
    "ticker",
    ParamKind::Ticker,
    "The stock ticker symbol. For example, 'AAPL' for Apple.",
);
const OPTIONAL_TICKER: Param = optional(
    "ticker",
    ParamKind::Ticker,
    "The stock ticker symbol. For example, 'AAPL' for Apple.",
);
const PERIOD: Param = required(
    "period",
    ParamKind::Choice(PERIODS),
    "Reporting period: 'annual', 'quarterly', or 'ttm' (trailing twelve months).",
);
const STATEMENT_LIMIT: Param = defaulted(
    "limit",
    ParamKind::PositiveInt,
    "10",
    "Maximum number of report periods to return (default: 10).",
);
const START_DATE: Param = required(
    "start_date",
    ParamKind::Date,
    "Start date in YYYY-MM-DD format.",
);
const END_DATE: Param = required("end_date", ParamKind::Date, "End date in YYYY-MM-DD format.");
const INTERVAL: Param = defaulted(
    "interval",
    ParamKind::Choice(INTERVALS),
    "day",
    "Time interval for price data. Defaults to 'day'.",
);
const INTERVAL_MULTIPLIER: Param = defaulted(
    "interval_multiplier",
    ParamKind::PositiveInt,
    "1",
    "Multiplier for the interval. Defaults to 1.",
);
const YEAR: Param = required(
    "year",
    ParamKind::IntRange(1990, 2100),
    "Fiscal year of the filing, e.g. 2023.",
);

const RP_GT: Param = optional(
    "report_period_gt",
    ParamKind::Date,
    "Filter for periods after this date (YYYY-MM-DD).",
);
const RP_GTE: Param = optional(
    "report_period_gte",
    ParamKind::Date,
    "Filter for periods on or after this date (YYYY-MM-DD).",
);
const RP_LT: Param = optional(
    "report_period_lt",
    ParamKind::Date,
    "Filter for periods before this date (YYYY-MM-DD).",
);
const RP_LTE: Param = optional(
    "report_period_lte",
    ParamKind::Date,
    "Filter for periods on or before this date (YYYY-MM-DD).",
);
const RD_GT: Param = optional(
    "report_date_gt",
    ParamKind::Date,
    "Filter for reports after this date (YYYY-MM-DD).",
);
const RD_GTE: Param = optional(
    "report_date_gte",
    ParamKind::Date,
    "Filter for reports on or after this date (YYYY-MM-DD).",
);
const RD_LT: Param = optional(
    "report_date_lt",
    ParamKind::Date,
    "Filter for reports before this date (YYYY-MM-DD).",
);
const RD_LTE: Param = optional(
    "report_date_lte",
    ParamKind::Date,
    "Filter for reports on or before this date (YYYY-MM-DD).",
);
const TD_GT: Param = optional(
    "transaction_date_gt",
    ParamKind::Date,
    "Filter for trades after this date (YYYY-MM-DD).",
);
const TD_GTE: Param = optional(
    "transaction_date_gte",
    ParamKind::Date,
    "Filter for trades on or after this date (YYYY-MM-DD).",
);
const TD_LT: Param = optional(
    "transaction_date_lt",
    ParamKind::Date,
    "Filter for trades before this date (YYYY-MM-DD).",
);
const TD_LTE: Param = optional(
    "transaction_date_lte",
    ParamKind::Date,
    "Filter for trades on or before this date (YYYY-MM-DD).",
);

const STATEMENT_PARAMS: &[Param] = &[TICKER, PERIOD, STATEMENT_LIMIT, RP_GT, RP_GTE, RP_LT, RP_LTE];

/// Where a tool's data lives.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    path: &'static str,
    /// Top-level key holding the payload; the whole body is returned when absent.
    key: &'static str,
    /// Query parameters always sent.
    fixed: &'static [(&'static str, &'static str)],
}

const fn endpoint(path: &'static str, key: &'static str) -> Endpoint {
    Endpoint {
        path,
        key,
        fixed: &[],
    }
}

/// Arguments that passed validation, as ordered query pairs.
///
/// List arguments expand to one pair per element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedArgs {
    pairs: Vec<(String, String)>,
}

impl ValidatedArgs {
    /// Query pairs in declaration order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// First value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

/// The closed set of financial data tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinancialTool {
    /// Income statements for a company.
    IncomeStatements,
    /// Balance sheets for a company.
    BalanceSheets,
    /// Cash flow statements for a company.
    CashFlowStatements,
    /// All three statements in one call.
    AllFinancialStatements,
    /// SEC filing metadata.
    Filings,
    /// Item sections of a 10-K.
    TenKFilingItems,
    /// Item sections of a 10-Q.
    TenQFilingItems,
    /// Item sections of an 8-K.
    EightKFilingItems,
    /// Latest price snapshot.
    PriceSnapshot,
    /// Historical prices.
    Prices,
    /// Latest financial metrics.
    FinancialMetricsSnapshot,
    /// Historical financial metrics.
    FinancialMetrics,
    /// Company news.
    News,
    /// Analyst estimates.
    AnalystEstimates,
    /// Revenue by segment.
    SegmentedRevenues,
    /// Insider trades.
    InsiderTrades,
    /// Institutional ownership from 13F filings.
    InstitutionalOwnership,
    /// Company facts.
    CompanyFacts,
    /// Earnings press releases.
    EarningsPressReleases,
    /// Line items across several tickers.
    SearchLineItems,
    /// Full financials across several tickers.
    SearchFinancials,
    /// Historical cryptocurrency prices.
    CryptoPrices,
}

impl FinancialTool {
    /// Every tool, in registry order.
    pub const ALL: [Self; 22] = [
        Self::IncomeStatements,
        Self::BalanceSheets,
        Self::CashFlowStatements,
        Self::AllFinancialStatements,
        Self::TenKFilingItems,
        Self::TenQFilingItems,
        Self::EightKFilingItems,
        Self::Filings,
        Self::PriceSnapshot,
        Self::Prices,
        Self::FinancialMetricsSnapshot,
        Self::FinancialMetrics,
        Self::News,
        Self::AnalystEstimates,
        Self::SegmentedRevenues,
        Self::InsiderTrades,
        Self::InstitutionalOwnership,
        Self::CompanyFacts,
        Self::EarningsPressReleases,
        Self::SearchLineItems,
        Self::SearchFinancials,
        Self::CryptoPrices,
    ];

    /// Tool name exposed to the model.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IncomeStatements => "get_income_statements",
            Self::BalanceSheets => "get_balance_sheets",
            Self::CashFlowStatements => "get_cash_flow_statements",
            Self::AllFinancialStatements => "get_all_financial_statements",
            Self::Filings => "get_filings",
            Self::TenKFilingItems => "get_10K_filing_items",
            Self::TenQFilingItems => "get_10Q_filing_items",
            Self::EightKFilingItems => "get_8K_filing_items",
            Self::PriceSnapshot => "get_price_snapshot",
            Self::Prices => "get_prices",
            Self::FinancialMetricsSnapshot => "get_financial_metrics_snapshot",
            Self::FinancialMetrics => "get_financial_metrics",
            Self::News => "get_news",
            Self::AnalystEstimates => "get_analyst_estimates",
            Self::SegmentedRevenues => "get_segmented_revenues",
            Self::InsiderTrades => "get_insider_trades",
            Self::InstitutionalOwnership => "get_institutional_ownership",
            Self::CompanyFacts => "get_company_facts",
            Self::EarningsPressReleases => "get_earnings_press_releases",
            Self::SearchLineItems => "search_line_items",
            Self::SearchFinancials => "search_financials",
            Self::CryptoPrices => "get_crypto_prices",
        }
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Description shown to the model.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::IncomeStatements => {
                "Fetches a company's income statements: revenue, cost of revenue, gross profit, operating expenses, operating income, net income and earnings per share."
            }
            Self::BalanceSheets => {
                "Fetches a company's balance sheets: assets, liabilities, shareholders' equity, cash, debt and working capital items."
            }
            Self::CashFlowStatements => {
                "Fetches a company's cash flow statements: operating, investing and financing cash flows, capital expenditure and free cash flow."
            }
            Self::AllFinancialStatements => {
                "Fetches income statements, balance sheets and cash flow statements for a company in one call. Use when more than one statement is needed."
            }
            Self::Filings => {
                "Lists a company's SEC filings with type, filing date, report date and URL. Use to find the filings available before reading their contents."
            }
            Self::TenKFilingItems => {
                "Fetches item sections (e.g. Item 1 Business, Item 1A Risk Factors, Item 7 MD&A) from a company's annual 10-K report for a given year."
            }
            Self::TenQFilingItems => {
                "Fetches item sections from a company's quarterly 10-Q report for a given year and quarter."
            }
            Self::EightKFilingItems => {
                "Fetches the item sections of a specific 8-K current report, identified by its accession number."
            }
            Self::PriceSnapshot => {
                "Fetches the latest price snapshot for a stock: price, day change, change percent, volume and market cap. Use for current price questions."
            }
            Self::Prices => {
                "Retrieves historical price data for a stock over a date range: open, high, low, close and volume per interval."
            }
            Self::FinancialMetricsSnapshot => {
                "Fetches the latest financial metrics for a company: valuation ratios (P/E, EV/EBITDA), margins, returns, growth and leverage."
            }
            Self::FinancialMetrics => {
                "Retrieves historical financial metrics for a company across report periods, for trend analysis of valuation, profitability and growth."
            }
            Self::News => {
                "Fetches recent news articles about a company with title, source, date and URL."
            }
            Self::AnalystEstimates => {
                "Fetches analyst consensus estimates for a company, such as expected earnings per share and revenue, by fiscal period."
            }
            Self::SegmentedRevenues => {
                "Fetches a company's revenue broken down by business segment and geography across report periods."
            }
            Self::InsiderTrades => {
                "Fetches insider trading data for a company or a specific insider: transaction type, shares traded, price and resulting ownership."
            }
            Self::InstitutionalOwnership => {
                "Fetches institutional ownership from 13F filings: which funds hold a stock, position size, shares held and market value."
            }
            Self::CompanyFacts => {
                "Fetches basic company facts: name, CIK, industry, sector, exchange, market cap, headquarters, website and number of employees."
            }
            Self::EarningsPressReleases => {
                "Fetches earnings press releases from 8-K filings, with revenue, EPS, guidance and management commentary."
            }
            Self::SearchLineItems => {
                "Fetches specific financial line items (snake_case, e.g. 'revenue', 'net_income', 'free_cash_flow') across several tickers in one request. Ideal for peer comparisons."
            }
            Self::SearchFinancials => {
                "Fetches complete financial statements for several tickers in one request."
            }
            Self::CryptoPrices => {
                "Retrieves historical price data for a cryptocurrency (e.g. BTC, ETH, SOL) over a date range: open, high, low, close and volume."
            }
        }
    }

    const fn endpoint(self) -> Endpoint {
        match self {
            Self::IncomeStatements => endpoint("/financials/income-statements/", "income_statements"),
            Self::BalanceSheets => endpoint("/financials/balance-sheets/", "balance_sheets"),
            Self::CashFlowStatements => {
                endpoint("/financials/cash-flow-statements/", "cash_flow_statements")
            }
            Self::AllFinancialStatements => endpoint("/financials/", "financials"),
            Self::Filings => endpoint("/filings/", "filings"),
            Self::TenKFilingItems => Endpoint {
                path: "/filings/items/",
                key: "items",
                fixed: &[("filing_type", "10-K")],
            },
            Self::TenQFilingItems => Endpoint {
                path: "/filings/items/",
                key: "items",
                fixed: &[("filing_type", "10-Q")],
            },
            Self::EightKFilingItems => Endpoint {
                path: "/filings/items/",
                key: "items",
                fixed: &[("filing_type", "8-K")],
            },
            Self::PriceSnapshot => endpoint("/prices/snapshot/", "snapshot"),
            Self::Prices => endpoint("/prices/", "prices"),
            Self::FinancialMetricsSnapshot => endpoint("/financial-metrics/snapshot/", "snapshot"),
            Self::FinancialMetrics => endpoint("/financial-metrics/", "financial_metrics"),
            Self::News => endpoint("/news/", "news"),
            Self::AnalystEstimates => endpoint("/analyst-estimates/", "analyst_estimates"),
            Self::SegmentedRevenues => {
                endpoint("/financials/segmented-revenues/", "segmented_revenues")
            }
            Self::InsiderTrades => endpoint("/insider-trades/", "insider_trades"),
            Self::InstitutionalOwnership => {
                endpoint("/institutional-ownership/", "institutional_ownership")
            }
            Self::CompanyFacts => endpoint("/company/facts/", "company_facts"),
            Self::EarningsPressReleases => endpoint("/earnings/press-releases/", "earnings"),
            Self::SearchLineItems => endpoint("/financials/search/line-items/", "search_results"),
            Self::SearchFinancials => endpoint("/financials/search/", "search_results"),
            Self::CryptoPrices => endpoint("/crypto/prices/", "prices"),
        }
    }

    fn params(self) -> &'static [Param] {
        match self {
            Self::IncomeStatements
            | Self::BalanceSheets
            | Self::CashFlowStatements
            | Self::AllFinancialStatements => STATEMENT_PARAMS,
            Self::Filings => const { &[
                TICKER,
                optional(
                    "filing_type",
                    ParamKind::Choice(FILING_TYPES),
                    "Only return filings of this type, e.g. '10-K'.",
                ),
                defaulted(
                    "limit",
                    ParamKind::PositiveInt,
                    "10",
                    "Maximum number of filings to return (default: 10).",
                ),
            ] },
            Self::TenKFilingItems => const { &[
                TICKER,
                YEAR,
                optional(
                    "item",
                    ParamKind::Text,
                    "Specific item to fetch, e.g. 'Item-1A'. All items when omitted.",
                ),
            ] },
            Self::TenQFilingItems => const { &[
                TICKER,
                YEAR,
                required("quarter", ParamKind::IntRange(1, 4), "Fiscal quarter, 1 to 4."),
                optional(
                    "item",
                    ParamKind::Text,
                    "Specific item to fetch. All items when omitted.",
                ),
            ] },
            Self::EightKFilingItems => const { &[
                TICKER,
                required(
                    "accession_number",
                    ParamKind::Text,
                    "SEC accession number of the 8-K, e.g. '0000320193-24-000069'.",
                ),
            ] },
            Self::PriceSnapshot | Self::FinancialMetricsSnapshot | Self::CompanyFacts => const { &[TICKER] },
            Self::Prices | Self::CryptoPrices => const { &[
                TICKER,
                INTERVAL,
                INTERVAL_MULTIPLIER,
                START_DATE,
                END_DATE,
            ] },
            Self::FinancialMetrics => const { &[TICKER, PERIOD, STATEMENT_LIMIT, RP_GT, RP_GTE, RP_LT, RP_LTE] },
            Self::News => const { &[
                TICKER,
                optional("start_date", ParamKind::Date, "Earliest publish date (YYYY-MM-DD)."),
                optional("end_date", ParamKind::Date, "Latest publish date (YYYY-MM-DD)."),
                defaulted(
                    "limit",
                    ParamKind::PositiveInt,
                    "10",
                    "Maximum number of articles to return (default: 10).",
                ),
            ] },
            Self::AnalystEstimates => const { &[
                TICKER,
                defaulted(
                    "period",
                    ParamKind::Choice(ESTIMATE_PERIODS),
                    "annual",
                    "Estimate period: 'annual' or 'quarterly' (default: annual).",
                ),
            ] },
            Self::SegmentedRevenues => const { &[TICKER, PERIOD, STATEMENT_LIMIT] },
            Self::InsiderTrades => const { &[
                OPTIONAL_TICKER,
                optional(
                    "owner_cik",
                    ParamKind::Text,
                    "CIK of the insider. Optional if using ticker.",
                ),
                defaulted(
                    "limit",
                    ParamKind::PositiveInt,
                    "100",
                    "Maximum number of insider trades to return (default: 100).",
                ),
                TD_GT,
                TD_GTE,
                TD_LT,
                TD_LTE,
            ] },
            Self::InstitutionalOwnership => const { &[
                OPTIONAL_TICKER,
                optional(
                    "investor_cik",
                    ParamKind::Text,
                    "CIK of the institutional investor. Optional if using ticker.",
                ),
                defaulted(
                    "limit",
                    ParamKind::PositiveInt,
                    "100",
                    "Maximum number of ownership records to return (default: 100).",
                ),
                RD_GT,
                RD_GTE,
                RD_LT,
                RD_LTE,
            ] },
            Self::EarningsPressReleases => const { &[
                TICKER,
                defaulted(
                    "limit",
                    ParamKind::PositiveInt,
                    "10",
                    "Maximum number of press releases to return (default: 10).",
                ),
                RD_GT,
                RD_GTE,
                RD_LT,
                RD_LTE,
            ] },
            Self::SearchLineItems => const { &[
                required(
                    "line_items",
                    ParamKind::TextList,
                    "Financial line items in snake_case, e.g. ['revenue', 'net_income'].",
                ),
                required(
                    "tickers",
                    ParamKind::TickerList,
                    "Ticker symbols to search across, e.g. ['AAPL', 'MSFT'].",
                ),
                PERIOD,
                STATEMENT_LIMIT,
            ] },
            Self::SearchFinancials => const { &[
                required(
                    "tickers",
                    ParamKind::TickerList,
                    "Ticker symbols to search across, e.g. ['AAPL', 'MSFT'].",
                ),
                PERIOD,
                STATEMENT_LIMIT,
            ] },
        }
    }

    /// Parameters of which at least one must be present.
    const fn requires_any(self) -> &'static [&'static str] {
        match self {
            Self::InsiderTrades => &["ticker", "owner_cik"],
            Self::InstitutionalOwnership => &["ticker", "investor_cik"],
            _ => &[],
        }
    }

    /// JSON Schema for the tool's arguments.
    #[must_use]
    pub fn parameters(self) -> Value {
        let mut properties = Map::new();
        let mut required_names = Vec::new();
        for param in self.params() {
            properties.insert(param.name.to_string(), param_schema(param));
            if param.required {
                required_names.push(Value::String(param.name.to_string()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required_names,
            "additionalProperties": false,
        })
    }

    /// Definition sent to the model.
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Checks `args` against the parameter table.
    ///
    /// Tickers are uppercased, `null` counts as absent and defaults are
    /// filled in.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] naming the first offending
    /// argument.
    pub fn validate_args(self, args: &Map<String, Value>) -> Result<ValidatedArgs, ToolError> {
        let params = self.params();
        let invalid = |message: String| ToolError::InvalidArguments {
            name: self.name().to_string(),
            message,
        };

        if let Some(unknown) = args
            .keys()
            .find(|k| !params.iter().any(|p| p.name == k.as_str()))
        {
            return Err(invalid(format!("unknown argument '{unknown}'")));
        }

        let mut pairs = Vec::new();
        for param in params {
            match args.get(param.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    for rendered in check_value(param, value).map_err(&invalid)? {
                        pairs.push((param.name.to_string(), rendered));
                    }
                }
                None if param.required => {
                    return Err(invalid(format!("missing required argument '{}'", param.name)));
                }
                None => {
                    if let Some(default) = param.default {
                        pairs.push((param.name.to_string(), default.to_string()));
                    }
                }
            }
        }

        let any_of = self.requires_any();
        if !any_of.is_empty() && !any_of.iter().any(|name| pairs.iter().any(|(k, _)| k == *name)) {
            return Err(invalid(format!("one of {} is required", any_of.join(", "))));
        }

        Ok(ValidatedArgs { pairs })
    }

    /// Validates `args` and fetches the tool's data from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] before any request is made,
    /// or the source's error.
    pub async fn invoke(
        self,
        source: &dyn FinancialDataSource,
        args: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let validated = self.validate_args(args)?;
        let endpoint = self.endpoint();
        let mut query: Vec<(String, String)> = endpoint
            .fixed
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        query.extend(validated.into_pairs());

        let request = ApiRequest {
            tool: self.name(),
            path: endpoint.path,
            query,
        };
        let mut body = source.fetch(&request).await?;
        if let Some(payload) = body.get_mut(endpoint.key) {
            return Ok(payload.take());
        }
        Ok(body)
    }
}

fn param_schema(param: &Param) -> Value {
    let mut schema = match param.kind {
        ParamKind::Ticker | ParamKind::Text => json!({"type": "string"}),
        ParamKind::Date => json!({"type": "string", "pattern": r"^\d{4}-\d{2}-\d{2}$"}),
        ParamKind::Choice(values) => json!({"type": "string", "enum": values}),
        ParamKind::PositiveInt => json!({"type": "integer", "minimum": 1}),
        ParamKind::IntRange(min, max) => json!({"type": "integer", "minimum": min, "maximum": max}),
        ParamKind::TickerList | ParamKind::TextList => {
            json!({"type": "array", "items": {"type": "string"}, "minItems": 1})
        }
    };
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("description".to_string(), json!(param.description));
        if let Some(default) = param.default {
            let default = match param.kind {
                ParamKind::PositiveInt | ParamKind::IntRange(..) => {
                    default.parse::<i64>().map_or_else(|_| json!(default), |n| json!(n))
                }
                _ => json!(default),
            };
            obj.insert("default".to_string(), default);
        }
    }
    schema
}

/// Validates one value and renders it as query-string values.
fn check_value(param: &Param, value: &Value) -> Result<Vec<String>, String> {
    let name = param.name;
    match param.kind {
        ParamKind::Ticker => Ok(vec![check_ticker(name, value)?]),
        ParamKind::Date => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a string"))?;
            if is_valid_date(text) {
                Ok(vec![text.to_string()])
            } else {
                Err(format!("'{name}' must be a date in YYYY-MM-DD format, got '{text}'"))
            }
        }
        ParamKind::Choice(allowed) => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a string"))?;
            if allowed.contains(&text) {
                Ok(vec![text.to_string()])
            } else {
                Err(format!(
                    "'{name}' must be one of {}, got '{text}'",
                    allowed.join(", ")
                ))
            }
        }
        ParamKind::PositiveInt => match as_integer(value) {
            Some(n) if n > 0 => Ok(vec![n.to_string()]),
            _ => Err(format!("'{name}' must be a positive integer, got {value}")),
        },
        ParamKind::IntRange(min, max) => match as_integer(value) {
            Some(n) if (min..=max).contains(&n) => Ok(vec![n.to_string()]),
            _ => Err(format!(
                "'{name}' must be an integer between {min} and {max}, got {value}"
            )),
        },
        ParamKind::Text => match value.as_str().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(vec![text.to_string()]),
            _ => Err(format!("'{name}' must be a non-empty string")),
        },
        ParamKind::TickerList | ParamKind::TextList => {
            let items = value
                .as_array()
                .filter(|items| !items.is_empty())
                .ok_or_else(|| format!("'{name}' must be a non-empty list"))?;
            items
                .iter()
                .map(|item| {
                    if param.kind == ParamKind::TickerList {
                        check_ticker(name, item)
                    } else {
                        item.as_str()
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(ToString::to_string)
                            .ok_or_else(|| format!("'{name}' items must be non-empty strings"))
                    }
                })
                .collect()
        }
    }
}

fn check_ticker(name: &str, value: &Value) -> Result<String, String> {
    let raw = value
        .as_str()
        .ok_or_else(|| format!("'{name}' must be a string"))?;
    let ticker = raw.trim().to_uppercase();
    let matches = TICKER_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(&ticker));
    if matches {
        Ok(ticker)
    } else {
        Err(format!("'{name}' is not a valid ticker symbol: '{raw}'"))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// `YYYY-MM-DD` with a real calendar date.
fn is_valid_date(text: &str) -> bool {
    text.len() == 10 && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}
