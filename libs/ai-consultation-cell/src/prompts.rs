use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use shared_models::doctor::DoctorDetails;

const ASSISTANT_PROMPT: &str = r#"You are the medical assistant of an online clinic. You help patients put their symptoms into words and find the right specialist.

Your job:
- listen to the patient's symptoms and concerns with empathy;
- ask clarifying questions until the picture is clear;
- share general health information, never a diagnosis;
- suggest which medical specialization the patient should see;
- judge the urgency as low, medium, high or emergency.

Rules:
- Never present anything as a definitive diagnosis.
- Always encourage the patient to see a real doctor.
- Symptoms such as chest pain, difficulty breathing or severe bleeding call for emergency care. Say so immediately.
- Stay calm, warm and professional.

Once you know enough to recommend a specialist, include a JSON block exactly like this one:
```json
{
    "recommendation": true,
    "specialization": "Cardiology",
    "confidence": 0.85,
    "urgency": "medium",
    "reasoning": "Based on the described symptoms..."
}
```
Until then, answer conversationally and leave the JSON block out."#;

/// The assistant's system prompt. When `roster` is non-empty the doctors
/// currently accepting patients are listed under their specialization, best
/// rated and most experienced first.
pub fn system_prompt(roster: &[DoctorDetails]) -> String {
    if roster.is_empty() {
        return ASSISTANT_PROMPT.to_string();
    }

    let mut by_specialization: BTreeMap<&str, Vec<&DoctorDetails>> = BTreeMap::new();
    for details in roster {
        by_specialization
            .entry(details.specialization_title.as_str())
            .or_default()
            .push(details);
    }

    let mut prompt = String::from(ASSISTANT_PROMPT);
    prompt.push_str("\n\nDoctors currently available on the platform:\n");
    for (title, mut doctors) in by_specialization {
        doctors.sort_by(|a, b| ranking(a, b));
        let _ = writeln!(prompt, "\n{}:", title);
        for d in doctors {
            let _ = writeln!(
                prompt,
                "- Dr. {} (rating {:.1}, {} years of experience)",
                d.full_name, d.doctor.rating, d.doctor.experience_years
            );
        }
    }
    prompt.push_str("\nUse the specialization titles above when you recommend one.");
    prompt
}

fn ranking(a: &DoctorDetails, b: &DoctorDetails) -> Ordering {
    b.doctor
        .rating
        .partial_cmp(&a.doctor.rating)
        .unwrap_or(Ordering::Equal)
        .then(b.doctor.experience_years.cmp(&a.doctor.experience_years))
}

pub fn analysis_prompt(symptoms: &str) -> String {
    format!(
        r#"Based on the conversation above, give your final analysis.

Symptoms the patient first described: {}

Answer with this exact JSON structure:
{{
    "recommended_specialization": "name of the medical specialization",
    "confidence": 0.0,
    "urgency": "low|medium|high|emergency",
    "summary": "short summary of the consultation",
    "key_symptoms": ["symptom"],
    "suggested_questions_for_doctor": ["question the patient should ask"]
}}"#,
        symptoms
    )
}
