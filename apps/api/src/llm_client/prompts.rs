// Shared prompt constants.
// Stage templates live in interview::prompts; this file holds cross-cutting fragments.

/// System instruction sent with every model call.
pub const COACH_SYSTEM: &str = "You are Bunmi, an experienced and supportive interview coach. \
    You help candidates prepare for job interviews using the job description, \
    company information and CV they provide. \
    Be concrete and honest. Never invent facts about the candidate. \
    Follow the output format requested in each message exactly.";

/// Description of the CARL method, used when giving feedback.
pub const CARL_METHOD: &str = "\
    CARL method: Context (the situation and what was at stake), \
    Action (what the candidate personally did), \
    Result (the measurable outcome), \
    Learning (what the candidate took away and would do differently).";

/// Description of the STAR method, used for model answers.
pub const STAR_METHOD: &str = "\
    STAR method: Situation (set the scene), Task (the candidate's responsibility), \
    Action (the specific steps taken), Result (the outcome, quantified where possible).";
