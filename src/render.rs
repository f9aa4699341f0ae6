//! Plain-text month view for `attendcal show`.
use crate::calendar::{self, AttendanceRecord, AttendanceStatus, Cell, MonthKey, WEEKDAY_LABELS};
use crate::holidays::{holidays_in_month, Holiday};

/// Grid (all six rows), summary, then the month's holidays.
///
/// Days carry `+` for present, `-` for absent and `?` for any other mark.
pub fn month_text(key: MonthKey, record: &AttendanceRecord, holidays: &[Holiday]) -> calendar::Result<String> {
    let matrix    = calendar::build_matrix(key)?;
    let summary   = calendar::summarize(key, record)?;
    let mut lines = vec![key.title()?];

    let header: String = WEEKDAY_LABELS.iter().map(|l| format!(" {:>2} ", &l[..2])).collect();
    lines.push(header.trim_end().to_owned());

    for row in matrix.rows() {
        let line: String = row.iter().map(|c| match c {
            Cell::Empty  => "    ".to_owned(),
            Cell::Day(d) => {
                let mark = match record.status_on(key, *d) {
                    Some(AttendanceStatus::Present)  => '+',
                    Some(AttendanceStatus::Absent)   => '-',
                    Some(AttendanceStatus::Other(_)) => '?',
                    None                             => ' ',
                };
                format!(" {d:>2}{mark}")
            }
        }).collect();
        lines.push(line.trim_end().to_owned());
    }

    lines.push(String::new());
    lines.push(format!("Working days: {}", summary.working_days));
    lines.push(format!("Present:      {}", summary.present_count));
    lines.push(format!("Absent:       {}", summary.absent_count));

    let hols = holidays_in_month(holidays, key);
    lines.push(String::new());
    if hols.is_empty() {
        lines.push("No holidays this month.".to_owned());
    } else {
        lines.push("Holidays".to_owned());
        lines.extend(hols.iter().map(|h| format!("  {:<13}{}", h.label(), h.title)));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}
