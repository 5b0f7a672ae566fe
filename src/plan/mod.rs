//! 动作规划：原子动作模型、语义动词编译器、双臂同步调度器

pub mod action;
pub mod compiler;
pub mod scheduler;

pub use action::{Action, ActionCommand, ActionPlan, ArmPlan, Verb};
pub use compiler::{Constrain, GraspSpec, MoveFrame, PlaceSpec, PlanCompiler, PreDisAxis};
pub use scheduler::{ArmReport, ArmScheduler, StepReport};
