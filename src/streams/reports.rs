//! The report stream catalog
//!
//! Each stream is a GAQL template plus record metadata; the shared request
//! and pagination behavior lives in the pager.

use super::{Context, ReportStream};
use crate::config::Config;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::{Value, json};

/// Stringify decimal metric fields so downstream consumers get stable
/// precision instead of floats.
fn stringify_metrics(mut record: Value, fields: &[&str]) -> Value {
    if let Some(metrics) = record.get_mut("metrics").and_then(Value::as_object_mut) {
        for field in fields {
            if let Some(Value::Number(number)) = metrics.get(*field) {
                let text = number.to_string();
                metrics.insert((*field).to_string(), Value::String(text));
            }
        }
    }
    record
}

pub struct Campaigns;

impl ReportStream for Campaigns {
    fn name(&self) -> &'static str {
        "ga_campaign"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["campaign__id"]
    }

    fn gaql(&self, _config: &Config) -> String {
        "SELECT campaign.id, campaign.name FROM campaign ORDER BY campaign.id".to_string()
    }
}

pub struct AdGroups;

impl ReportStream for AdGroups {
    fn name(&self) -> &'static str {
        "ga_adgroups"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["adGroup__id", "adGroup__campaign", "adGroup__status"]
    }

    fn gaql(&self, _config: &Config) -> String {
        "SELECT ad_group.url_custom_parameters, \
         ad_group.type, \
         ad_group.tracking_url_template, \
         ad_group.targeting_setting.target_restrictions, \
         ad_group.target_roas, \
         ad_group.target_cpm_micros, \
         ad_group.status, \
         ad_group.target_cpa_micros, \
         ad_group.resource_name, \
         ad_group.percent_cpc_bid_micros, \
         ad_group.name, \
         ad_group.labels, \
         ad_group.id, \
         ad_group.final_url_suffix, \
         ad_group.excluded_parent_asset_field_types, \
         ad_group.effective_target_roas_source, \
         ad_group.effective_target_roas, \
         ad_group.effective_target_cpa_source, \
         ad_group.effective_target_cpa_micros, \
         ad_group.display_custom_bid_dimension, \
         ad_group.cpv_bid_micros, \
         ad_group.cpm_bid_micros, \
         ad_group.cpc_bid_micros, \
         ad_group.campaign, \
         ad_group.base_ad_group, \
         ad_group.ad_rotation_mode \
         FROM ad_group"
            .to_string()
    }
}

pub struct AdGroupsPerformance;

impl ReportStream for AdGroupsPerformance {
    fn name(&self) -> &'static str {
        "ga_adgroupsperformance"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["campaign__id", "adGroup__id"]
    }

    fn gaql(&self, config: &Config) -> String {
        format!(
            "SELECT campaign.id, ad_group.id, metrics.impressions, metrics.clicks, \
             metrics.cost_micros \
             FROM ad_group \
             WHERE segments.date >= {start} AND segments.date <= {end}",
            start = config.start_date_literal(),
            end = config.end_date_literal(),
        )
    }
}

pub struct CampaignPerformance;

impl ReportStream for CampaignPerformance {
    fn name(&self) -> &'static str {
        "ga_campaign_performance"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &[
            "campaign__name",
            "campaign__status",
            "segments__date",
            "segments__device",
        ]
    }

    fn gaql(&self, config: &Config) -> String {
        format!(
            "SELECT campaign.name, campaign.status, segments.device, segments.date, \
             metrics.impressions, metrics.clicks, metrics.ctr, metrics.average_cpc, \
             metrics.cost_micros \
             FROM campaign \
             WHERE segments.date >= {start} AND segments.date <= {end}",
            start = config.start_date_literal(),
            end = config.end_date_literal(),
        )
    }

    fn post_process(&self, record: Value) -> Value {
        stringify_metrics(record, &["ctr", "averageCpc"])
    }
}

pub struct CampaignPerformanceByAgeRangeAndDevice;

impl ReportStream for CampaignPerformanceByAgeRangeAndDevice {
    fn name(&self) -> &'static str {
        "ga_campaign_performance_by_age_range_and_device"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &[
            "adGroupCriterion__ageRange__type",
            "campaign__name",
            "segments__date",
            "campaign__status",
            "segments__device",
        ]
    }

    fn gaql(&self, config: &Config) -> String {
        format!(
            "SELECT ad_group_criterion.age_range.type, campaign.name, campaign.status, \
             ad_group.name, segments.date, segments.device, \
             ad_group_criterion.system_serving_status, ad_group_criterion.bid_modifier, \
             metrics.clicks, metrics.impressions, metrics.ctr, metrics.average_cpc, \
             metrics.cost_micros, campaign.advertising_channel_type \
             FROM age_range_view \
             WHERE segments.date >= {start} AND segments.date <= {end}",
            start = config.start_date_literal(),
            end = config.end_date_literal(),
        )
    }

    fn post_process(&self, record: Value) -> Value {
        stringify_metrics(record, &["ctr", "averageCpc"])
    }
}

pub struct CampaignPerformanceByGenderAndDevice;

impl ReportStream for CampaignPerformanceByGenderAndDevice {
    fn name(&self) -> &'static str {
        "ga_campaign_performance_by_gender_and_device"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &[
            "adGroupCriterion__gender__type",
            "campaign__name",
            "segments__date",
            "campaign__status",
            "segments__device",
        ]
    }

    fn gaql(&self, config: &Config) -> String {
        format!(
            "SELECT ad_group_criterion.gender.type, campaign.name, campaign.status, \
             ad_group.name, segments.date, segments.device, \
             ad_group_criterion.system_serving_status, ad_group_criterion.bid_modifier, \
             metrics.clicks, metrics.impressions, metrics.ctr, metrics.average_cpc, \
             metrics.cost_micros, campaign.advertising_channel_type \
             FROM gender_view \
             WHERE segments.date >= {start} AND segments.date <= {end}",
            start = config.start_date_literal(),
            end = config.end_date_literal(),
        )
    }

    fn post_process(&self, record: Value) -> Value {
        stringify_metrics(record, &["ctr", "averageCpc"])
    }
}

pub struct CampaignPerformanceByLocation;

impl ReportStream for CampaignPerformanceByLocation {
    fn name(&self) -> &'static str {
        "ga_campaign_performance_by_location"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &[
            "campaignCriterion__location__geoTargetConstant",
            "campaign__name",
            "segments__date",
        ]
    }

    fn gaql(&self, config: &Config) -> String {
        format!(
            "SELECT campaign_criterion.location.geo_target_constant, campaign.name, \
             campaign_criterion.bid_modifier, segments.date, metrics.clicks, \
             metrics.impressions, metrics.ctr, metrics.average_cpc, metrics.cost_micros \
             FROM location_view \
             WHERE segments.date >= {start} AND segments.date <= {end} \
             AND campaign_criterion.status != 'REMOVED'",
            start = config.start_date_literal(),
            end = config.end_date_literal(),
        )
    }

    fn post_process(&self, record: Value) -> Value {
        stringify_metrics(record, &["ctr", "averageCpc"])
    }
}

/// Geo target constants are worldwide and identical for every customer, so
/// the stream syncs once per run rather than once per account.
pub struct Geotargets;

impl ReportStream for Geotargets {
    fn name(&self) -> &'static str {
        "ga_geo_target_constant"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["geoTargetConstant__id"]
    }

    fn gaql(&self, _config: &Config) -> String {
        "SELECT \
         geo_target_constant.canonical_name, \
         geo_target_constant.country_code, \
         geo_target_constant.id, \
         geo_target_constant.name, \
         geo_target_constant.status, \
         geo_target_constant.target_type \
         FROM geo_target_constant"
            .to_string()
    }

    fn sync_once(&self) -> bool {
        true
    }
}

pub struct GeoPerformance;

impl ReportStream for GeoPerformance {
    fn name(&self) -> &'static str {
        "ga_geo_performance"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &[
            "geographicView__countryCriterionId",
            "customer_id",
            "campaign__name",
            "segments__date",
        ]
    }

    fn gaql(&self, config: &Config) -> String {
        format!(
            "SELECT \
             campaign.name, \
             campaign.status, \
             segments.date, \
             metrics.clicks, \
             metrics.cost_micros, \
             metrics.impressions, \
             metrics.conversions, \
             geographic_view.location_type, \
             geographic_view.country_criterion_id \
             FROM geographic_view \
             WHERE segments.date >= {start} AND segments.date <= {end}",
            start = config.start_date_literal(),
            end = config.end_date_literal(),
        )
    }

    fn post_process(&self, record: Value) -> Value {
        stringify_metrics(record, &["conversions"])
    }
}

/// Click view report, one query window per day in `[start_date, end_date)`.
///
/// Requires extra permissions on the Google Ads account, which is why the
/// stream is config-gated and why a 403 is resumable: an account without
/// the permission truncates its own invocation instead of failing the run.
pub struct ClickViewReport;

impl ClickViewReport {
    fn daily_gaql(date: NaiveDate) -> String {
        format!(
            "SELECT \
             click_view.gclid, \
             customer.id, \
             click_view.ad_group_ad, \
             ad_group.id, \
             ad_group.name, \
             campaign.id, \
             campaign.name, \
             segments.ad_network_type, \
             segments.device, \
             segments.date, \
             segments.slot, \
             metrics.clicks, \
             segments.click_type, \
             click_view.keyword, \
             click_view.keyword_info.match_type \
             FROM click_view \
             WHERE segments.date = '{}'",
            date.format("%Y-%m-%d")
        )
    }
}

impl ReportStream for ClickViewReport {
    fn name(&self) -> &'static str {
        "ga_click_view_report"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &[
            "clickView__gclid",
            "clickView__keyword",
            "clickView__keywordInfo__matchType",
            "customer__id",
            "adGroup__id",
            "campaign__id",
            "segments__device",
            "segments__adNetworkType",
            "segments__slot",
            "date",
        ]
    }

    fn gaql(&self, config: &Config) -> String {
        Self::daily_gaql(config.start_date)
    }

    fn queries(&self, config: &Config) -> Vec<String> {
        config
            .start_date
            .iter_days()
            .take_while(|date| *date < config.end_date)
            .map(Self::daily_gaql)
            .collect()
    }

    fn replication_key(&self) -> Option<&'static str> {
        Some("date")
    }

    // The API rejects sort parameters on click_view queries.
    fn sorted(&self) -> bool {
        false
    }

    fn is_resumable(&self, status: StatusCode) -> bool {
        status == StatusCode::FORBIDDEN
    }

    fn resumable_message(&self, context: &Context, _status: StatusCode, body: &Value) -> String {
        let detail = body["error"]["details"][0]["errors"][0]["message"]
            .as_str()
            .unwrap_or("permission denied");
        format!(
            "Click view report not accessible to customer '{}': {}",
            context.customer_id, detail
        )
    }

    fn post_process(&self, mut record: Value) -> Value {
        // Hoist the day segment to a top-level replication field
        if let Some(date) = record
            .get_mut("segments")
            .and_then(Value::as_object_mut)
            .and_then(|segments| segments.remove("date"))
        {
            record["date"] = date;
        }

        if let Some(click_view) = record.get_mut("clickView").and_then(Value::as_object_mut) {
            if click_view.get("keyword").is_none_or(Value::is_null) {
                click_view.insert("keyword".into(), Value::String("null".into()));
                click_view.insert("keywordInfo".into(), json!({ "matchType": "null" }));
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::test_support::test_config;

    #[test]
    fn test_date_window_templated_into_gaql() {
        let config = test_config();
        let gaql = CampaignPerformance.gaql(&config);
        assert!(gaql.contains("segments.date >= '2024-01-01'"));
        assert!(gaql.contains("segments.date <= '2024-03-31'"));
    }

    #[test]
    fn test_click_view_one_query_per_day() {
        let mut config = test_config();
        config.start_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        config.end_date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();

        let queries = ClickViewReport.queries(&config);
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("segments.date = '2024-01-01'"));
        assert!(queries[2].contains("segments.date = '2024-01-03'"));
    }

    #[test]
    fn test_click_view_empty_window() {
        let mut config = test_config();
        config.end_date = config.start_date;
        assert!(ClickViewReport.queries(&config).is_empty());
    }

    #[test]
    fn test_stringify_metrics_converts_numbers_only() {
        let record = json!({
            "metrics": { "ctr": 0.125, "averageCpc": 420000, "clicks": 10 }
        });
        let processed = CampaignPerformance.post_process(record);
        assert_eq!(processed["metrics"]["ctr"], json!("0.125"));
        assert_eq!(processed["metrics"]["averageCpc"], json!("420000"));
        // Not listed as a decimal field, left numeric
        assert_eq!(processed["metrics"]["clicks"], json!(10));
    }

    #[test]
    fn test_click_view_post_process_hoists_date() {
        let record = json!({
            "segments": { "date": "2024-01-02", "device": "MOBILE" },
            "clickView": { "gclid": "abc", "keyword": "shoes" }
        });
        let processed = ClickViewReport.post_process(record);
        assert_eq!(processed["date"], json!("2024-01-02"));
        assert!(processed["segments"].get("date").is_none());
        assert_eq!(processed["clickView"]["keyword"], json!("shoes"));
    }

    #[test]
    fn test_click_view_post_process_fills_null_keyword() {
        let record = json!({
            "segments": { "date": "2024-01-02" },
            "clickView": { "gclid": "abc", "keyword": null }
        });
        let processed = ClickViewReport.post_process(record);
        assert_eq!(processed["clickView"]["keyword"], json!("null"));
        assert_eq!(processed["clickView"]["keywordInfo"]["matchType"], json!("null"));
    }

    #[test]
    fn test_geotargets_sync_once() {
        assert!(Geotargets.sync_once());
        assert!(!Campaigns.sync_once());
    }
}
