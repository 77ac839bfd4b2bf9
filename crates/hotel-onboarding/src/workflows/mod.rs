pub mod onboarding;
pub mod roster;
