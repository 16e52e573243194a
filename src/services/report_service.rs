// src/services/report_service.rs
use crate::{
    error::{AppError, AppResult},
    models::attendance::{AttendanceReportRow, ReportFilter},
};
use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub const CSV_HEADER: [&str; 11] = [
    "id",
    "teacher_name",
    "national_id",
    "class_name",
    "grade",
    "major",
    "period_index",
    "scan_date",
    "scanned_at",
    "teacher_id",
    "class_id",
];

/// Attendance joined with teacher and class, narrowed by the optional filters.
pub async fn attendance_report(db_pool: &SqlitePool, filter: &ReportFilter) -> AppResult<Vec<AttendanceReportRow>> {
    let date = match filter.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD.", raw)))?,
        ),
        None => None,
    };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT a.id, a.teacher_id, t.name AS teacher_name, t.national_id,
               a.class_id, c.name AS class_name, c.grade, c.major,
               a.period_index, a.scanned_at, a.scan_date
        FROM attendance a
        JOIN teachers t ON t.id = a.teacher_id
        JOIN classes c ON c.id = a.class_id
        WHERE 1 = 1
        "#,
    );
    if let Some(date) = date {
        qb.push(" AND a.scan_date = ").push_bind(date.format("%Y-%m-%d").to_string());
    }
    if let Some(teacher_id) = filter.teacher_id {
        qb.push(" AND a.teacher_id = ").push_bind(teacher_id);
    }
    if let Some(class_id) = filter.class_id {
        qb.push(" AND a.class_id = ").push_bind(class_id);
    }
    if let Some(period_index) = filter.period_index {
        qb.push(" AND a.period_index = ").push_bind(period_index);
    }
    qb.push(" ORDER BY a.scanned_at ASC, a.id ASC");

    let rows = qb.build_query_as::<AttendanceReportRow>().fetch_all(db_pool).await?;
    tracing::debug!("Attendance report: {} rows for {:?}", rows.len(), filter);
    Ok(rows)
}

/// Renders report rows as CSV (header line first).
pub fn to_csv(rows: &[AttendanceReportRow]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for row in rows {
        writer
            .write_record([
                row.id.to_string(),
                row.teacher_name.clone(),
                row.national_id.clone().unwrap_or_default(),
                row.class_name.clone(),
                row.grade.clone(),
                row.major.clone().unwrap_or_default(),
                row.period_index.to_string(),
                row.scan_date.clone(),
                row.scanned_at.clone(),
                row.teacher_id.to_string(),
                row.class_id.to_string(),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer.into_inner().map_err(|e| {
        tracing::error!("CSV flush failed: {}", e);
        AppError::InternalServerError
    })?;
    String::from_utf8(bytes).map_err(|e| {
        tracing::error!("CSV output is not UTF-8: {}", e);
        AppError::InternalServerError
    })
}

// A4 landscape, Courier so the columns line up
const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;
const MARGIN_MM: f32 = 15.0;
const LINE_MM: f32 = 5.5;
const FONT_SIZE: f32 = 9.0;

/// Renders report rows as a paginated PDF table.
pub fn to_pdf(rows: &[AttendanceReportRow], filter: &ReportFilter) -> AppResult<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        "Attendance Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc.add_builtin_font(BuiltinFont::Courier).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::CourierBold).map_err(pdf_error)?;

    let mut layer = doc.get_page(page).get_layer(layer);
    layer.use_text(
        "Attendance Report",
        14.0,
        Mm(MARGIN_MM),
        Mm(PAGE_HEIGHT_MM - MARGIN_MM),
        &bold,
    );
    layer.use_text(
        describe_filter(filter, rows.len()),
        FONT_SIZE,
        Mm(MARGIN_MM),
        Mm(PAGE_HEIGHT_MM - MARGIN_MM - 7.0),
        &regular,
    );
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM - 18.0;
    write_table_header(&layer, &bold, y);
    y -= LINE_MM;

    for row in rows {
        if y < MARGIN_MM {
            layer = new_page(&doc);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
            write_table_header(&layer, &bold, y);
            y -= LINE_MM;
        }
        layer.use_text(pdf_line(row), FONT_SIZE, Mm(MARGIN_MM), Mm(y), &regular);
        y -= LINE_MM;
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    doc.get_page(page).get_layer(layer)
}

fn write_table_header(layer: &PdfLayerReference, font: &IndirectFontRef, y: f32) {
    let header = format!(
        "{:<10} {:<6} {:<24} {:<18} {:<22} {:<6}",
        "Date", "Time", "Teacher", "National ID", "Class", "Period"
    );
    layer.use_text(header, FONT_SIZE, Mm(MARGIN_MM), Mm(y), font);
}

fn pdf_line(row: &AttendanceReportRow) -> String {
    let class = match &row.major {
        Some(major) => format!("{} {} {}", row.grade, row.class_name, major),
        None => format!("{} {}", row.grade, row.class_name),
    };
    // scanned_at is RFC3339 UTC; the table shows HH:MM UTC
    let time = row.scanned_at.get(11..16).unwrap_or("");
    format!(
        "{:<10} {:<6} {:<24} {:<18} {:<22} {:<6}",
        row.scan_date,
        time,
        fit(&row.teacher_name, 24),
        fit(row.national_id.as_deref().unwrap_or("-"), 18),
        fit(&class, 22),
        row.period_index
    )
}

fn fit(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

fn describe_filter(filter: &ReportFilter, count: usize) -> String {
    let mut parts = vec![format!(
        "Date: {}",
        filter.date.as_deref().filter(|d| !d.trim().is_empty()).unwrap_or("all")
    )];
    if let Some(id) = filter.teacher_id {
        parts.push(format!("Teacher #{}", id));
    }
    if let Some(id) = filter.class_id {
        parts.push(format!("Class #{}", id));
    }
    if let Some(p) = filter.period_index {
        parts.push(format!("Period {}", p));
    }
    parts.push(format!("{} records", count));
    parts.join("  |  ")
}

fn pdf_error<E: std::fmt::Debug>(e: E) -> AppError {
    tracing::error!("PDF rendering failed: {:?}", e);
    AppError::InternalServerError
}

fn csv_error(e: csv::Error) -> AppError {
    tracing::error!("CSV write failed: {}", e);
    AppError::InternalServerError
}

#[cfg(test)]
mod report_tests {
    use super::*;
    use crate::{
        clock::{local, FixedClock},
        db::test_pool,
        models::attendance::ScanRequest,
        services::attendance_service::{record_scan, test_support::seed_monday_lesson},
    };

    async fn seeded_report_pool() -> (SqlitePool, i64, i64) {
        let pool = test_pool().await;
        let s = seed_monday_lesson(&pool).await;
        let scan = ScanRequest {
            qr_token: s.class.qr_token.clone(),
            period_index: 2,
        };
        for day in [6, 13] {
            let clock = FixedClock(local(420, 2025, 1, day, 8, 15));
            record_scan(&pool, &clock, s.teacher.id, &scan).await.unwrap();
        }
        (pool, s.teacher.id, s.class.id)
    }

    #[tokio::test]
    async fn filters_narrow_the_report() {
        let (pool, teacher_id, class_id) = seeded_report_pool().await;

        let all = attendance_report(&pool, &ReportFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].scan_date, "2025-01-06");
        assert_eq!(all[0].teacher_name, "Teacher budi");

        let one_day = ReportFilter {
            date: Some("2025-01-13".into()),
            ..Default::default()
        };
        assert_eq!(attendance_report(&pool, &one_day).await.unwrap().len(), 1);

        let other_teacher = ReportFilter {
            teacher_id: Some(teacher_id + 1),
            class_id: Some(class_id),
            ..Default::default()
        };
        assert!(attendance_report(&pool, &other_teacher).await.unwrap().is_empty());

        let wrong_period = ReportFilter {
            period_index: Some(1),
            ..Default::default()
        };
        assert!(attendance_report(&pool, &wrong_period).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_date_is_rejected() {
        let pool = test_pool().await;
        let filter = ReportFilter {
            date: Some("06/01/2025".into()),
            ..Default::default()
        };
        assert!(matches!(
            attendance_report(&pool, &filter).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn csv_has_header_and_one_line_per_record() {
        let (pool, _, _) = seeded_report_pool().await;
        let rows = attendance_report(&pool, &ReportFilter::default()).await.unwrap();
        let csv = to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,teacher_name,national_id"));
        assert!(lines[1].contains("Teacher budi"));
        assert!(lines[1].contains("2025-01-06T01:15:00Z"));
    }

    #[tokio::test]
    async fn pdf_is_rendered_across_pages() {
        let (pool, _, _) = seeded_report_pool().await;
        let rows = attendance_report(&pool, &ReportFilter::default()).await.unwrap();
        let pdf = to_pdf(&rows, &ReportFilter::default()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        // enough rows to spill onto a second page
        let many: Vec<AttendanceReportRow> = rows.iter().cycle().take(80).cloned().collect();
        let long = to_pdf(&many, &ReportFilter::default()).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert!(long.len() > pdf.len());
    }

    #[test]
    fn pdf_line_keeps_columns_aligned() {
        let row = AttendanceReportRow {
            id: 1,
            teacher_id: 1,
            teacher_name: "A very long teacher name that does not fit".into(),
            national_id: None,
            class_id: 1,
            class_name: "A".into(),
            grade: "X".into(),
            major: Some("IPA".into()),
            period_index: 2,
            scanned_at: "2025-01-06T01:15:00Z".into(),
            scan_date: "2025-01-06".into(),
        };
        let line = pdf_line(&row);
        assert!(line.starts_with("2025-01-06 01:15 "));
        assert!(line.contains("X A IPA"));
        assert!(!line.contains("does not fit"));
    }
}
