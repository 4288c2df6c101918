use aws_sdk_s3::primitives::ByteStream;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::market::resolver::{MatchResult, ValuationQuery};
use crate::money::format_try;
use crate::valuation::estimator::{Confidence, Valuation};

pub fn report_key(valuation_id: Uuid) -> String {
    format!("valuations/{valuation_id}.md")
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "High",
        Confidence::Medium => "Medium",
        Confidence::Low => "Low",
    }
}

/// Renders a valuation as a markdown report for the agent's records.
pub fn render_valuation_to_md(
    valuation_id: Uuid,
    query: &ValuationQuery,
    comparable: Option<&MatchResult>,
    valuation: &Valuation,
) -> String {
    let mut md = format!("# Valuation Report — {valuation_id}\n\n");

    md.push_str("## Property\n\n");
    md.push_str(&format!(
        "- **Location:** {} / {}\n",
        query.city, query.district
    ));
    md.push_str(&format!("- **Type:** {}\n", query.property_type));
    if let Some(rooms) = &query.room_count {
        md.push_str(&format!("- **Rooms:** {rooms}\n"));
    }
    if let Some(area) = query.area_m2 {
        md.push_str(&format!("- **Area:** {area} m²\n"));
    }
    if let Some(age) = query.building_age {
        md.push_str(&format!("- **Building age:** {age}\n"));
    }
    if let Some(floor) = query.floor {
        match query.total_floors {
            Some(total) => md.push_str(&format!("- **Floor:** {floor} / {total}\n")),
            None => md.push_str(&format!("- **Floor:** {floor}\n")),
        }
    }
    if !query.features.is_empty() {
        md.push_str(&format!("- **Features:** {}\n", query.features.join(", ")));
    }

    md.push_str("\n## Estimate\n\n");
    md.push_str(&format!(
        "- **Estimated value:** {}\n",
        format_try(valuation.estimated_value)
    ));
    md.push_str(&format!(
        "- **Range:** {} – {}\n",
        format_try(valuation.low_value),
        format_try(valuation.high_value)
    ));
    md.push_str(&format!(
        "- **Confidence:** {}\n",
        confidence_label(valuation.confidence)
    ));
    md.push_str(&format!(
        "- **Estimator:** {}\n",
        valuation.estimator_backend
    ));

    md.push_str("\n## Market Comparable\n\n");
    match comparable {
        Some(m) => {
            md.push_str(&format!("- **Match:** {}\n", m.kind.as_str()));
            md.push_str(&format!(
                "- **Source:** {} / {} / {}",
                m.stat.city, m.stat.district, m.stat.property_type
            ));
            if let Some(rooms) = &m.stat.room_count {
                md.push_str(&format!(" / {rooms}"));
            }
            md.push('\n');
            md.push_str(&format!(
                "- **Median:** {} (min {}, max {})\n",
                format_try(m.stat.median_price),
                format_try(m.stat.min_price),
                format_try(m.stat.max_price)
            ));
            md.push_str(&format!(
                "- **Per m²:** {}\n",
                format_try(m.stat.price_per_area)
            ));
            md.push_str(&format!("- **Samples:** {}\n", m.stat.sample_size));
            md.push_str(&format!(
                "- **Updated:** {}\n",
                m.stat.updated_at.format("%Y-%m-%d")
            ));
        }
        None => md.push_str("No market comparable was found for this location.\n"),
    }

    if !valuation.rationale.is_empty() {
        md.push_str("\n## Rationale\n\n");
        for line in &valuation.rationale {
            md.push_str(&format!("- {line}\n"));
        }
    }

    md
}

/// Uploads the rendered report and returns its object key.
pub async fn upload_report(
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    valuation_id: Uuid,
    markdown: String,
) -> Result<String, AppError> {
    let key = report_key(valuation_id);
    s3.put_object()
        .bucket(s3_bucket)
        .key(&key)
        .body(ByteStream::from(markdown.into_bytes()))
        .content_type("text/markdown")
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Upload of {key} failed: {e}")))?;

    info!("Uploaded valuation report to s3://{}/{}", s3_bucket, key);
    Ok(key)
}
