pub mod assessment;
pub mod athlete;
pub mod plan;

pub use assessment::{Assessment, AssessmentType, NewAssessment};
pub use athlete::{Athlete, AthleteProfileUpdate, AthleteStatus, Metrics, NewAthlete};
pub use plan::{PlanWeek, PlanWorkout, TrainingPlan, WorkoutFeedback};
