//! The narrative written in the REMARKS block of the worksheet.

use crate::config::CellValue;

pub const ACFT_FAIL_HEIGHT_WEIGHT_PASS: &str = "The Soldier exceeded the Army's height and weight \
standards outlined in AR 600-9; however, the Soldier achieved a total score of 540 or above on the \
Army Combat Fitness Test (ACFT), with a minimum of 80 points in each event. As such, the Soldier is \
exempt from being flagged or enrolled in the Army Body Composition Program (ABCP).";

pub fn height_weight_pass(weight: &CellValue, max_weight: &CellValue) -> String {
    format!(
        "The Soldier has met the Army's height and weight standards as outlined in AR 600-9. \
The Soldier's weight of {weight} pounds is within the maximum allowable weight of {max_weight} pounds. \
The Soldier is encouraged to maintain current fitness and body composition levels to support \
mission readiness."
    )
}

pub fn met_standard(body_fat_percentage: i64, body_fat_standard: i64) -> String {
    format!(
        "The individual has met the Army's body fat standards as outlined in AR 600-9. \
The Soldier's body fat percentage was {body_fat_percentage}%, which is within the standard of \
{body_fat_standard}%. The Soldier is in compliance with the Army Body Composition Program (ABCP) \
and requires no further action. Maintain focus on overall health and physical readiness."
    )
}

pub fn did_not_meet_standards(body_fat_percentage: i64, body_fat_standard: i64) -> String {
    format!(
        "The individual has exceeded the allowable body fat standards as outlined in AR 600-9. \
The Soldier's body fat percentage was {body_fat_percentage}%, which exceeds the standard of \
{body_fat_standard}%. The Soldier is noncompliant with the Army Body Composition Program (ABCP) \
and must be enrolled in the program. Soldier will adhere to the requirements outlined in AR 600-9 \
to achieve compliance."
    )
}
