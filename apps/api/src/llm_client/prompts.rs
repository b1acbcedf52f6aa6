// Prompt constants for résumé extraction.
// The layout below is the contract with `NormalizedRecord`; keep the two in step.

/// System prompt that enforces JSON-only output.
pub const EXTRACTION_SYSTEM: &str = "You are a precise résumé parser for a recruiting team. \
    You MUST respond with one valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT invent facts that are not in the document.";

/// Single-shot instruction: every group and the AI analysis in one response.
pub const EXTRACTION_INSTRUCTION: &str = r#"Extract everything from the résumé and produce the AI analysis. Output one JSON object with exactly this layout:

{
  "basic_info": {
    "chinese_name": "", "english_name": "", "gender": "", "birth_date": "YYYY-MM-DD",
    "native_place": "", "current_city": "", "political_status": "", "marital_status": "",
    "health": "", "height_cm": "", "weight_kg": "", "personality": ""
  },
  "contact_info": {"phone": "", "email": "", "wechat": ""},
  "summary": {
    "total_years": "", "industries": [], "roles": [], "skills": [], "awards": [],
    "languages": [], "highest_education": ""
  },
  "expectations": {
    "position": "", "cities": [], "salary_monthly": "", "salary_yearly": "", "industries": [],
    "company_nature": "", "company_size": "", "company_stage": "", "location_range_km": "",
    "additional_conditions": "", "job_search_status": ""
  },
  "work_experiences": [
    {
      "company_name": "", "company_intro": "", "company_size": "", "company_type": "",
      "company_stage": "", "company_location": "", "start_date": "YYYY-MM", "end_date": "YYYY-MM",
      "current_status": "", "position": "", "department": "", "report_to": "",
      "subordinates": "", "job_description": "", "job_details": [], "achievements": []
    }
  ],
  "education_experiences": [
    {
      "school": "", "major": "", "degree": "", "start_date": "YYYY-MM", "end_date": "YYYY-MM",
      "main_courses": [], "certificates": [], "ranking": ""
    }
  ],
  "project_experiences": [
    {
      "project_name": "", "role": "", "start_date": "YYYY-MM", "end_date": "YYYY-MM",
      "project_intro": "", "project_achievements": ""
    }
  ],
  "ai_analysis": {"profile": "", "swot": {}, "career_stage": "", "personality": ""}
}

Rules:
1. Extract every piece of information the document contains.
2. Use null for anything the document does not state.
3. work_experiences, education_experiences and project_experiences are arrays, most recent first.
4. Dates use YYYY-MM-DD or YYYY-MM. Use null for "present".
5. Base the ai_analysis on the extracted facts: a short profile, a SWOT analysis, the career stage and personality traits."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_names_every_group() {
        for group in [
            "basic_info",
            "contact_info",
            "summary",
            "expectations",
            "work_experiences",
            "education_experiences",
            "project_experiences",
            "ai_analysis",
        ] {
            assert!(
                EXTRACTION_INSTRUCTION.contains(&format!("\"{group}\"")),
                "missing {group}"
            );
        }
    }
}
