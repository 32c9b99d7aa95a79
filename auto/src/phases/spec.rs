//! Per-phase declarative configuration
//!
//! A phase is mostly this table: a system prompt, a user-message template,
//! and the specialist role it talks to. The shared kernel does the rest.
//! Templates are Handlebars; the kernel supplies `task`, `file`, `stage`,
//! `context`, and `inbox`.

use crate::llm::ModelRole;

use super::PhaseKind;

#[derive(Debug, Clone, Copy)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    pub model_role: ModelRole,
    pub system_prompt: &'static str,
    pub user_template: &'static str,
}

pub fn spec_for(kind: PhaseKind) -> PhaseSpec {
    use PhaseKind::*;
    match kind {
        Planning => PhaseSpec {
            kind,
            model_role: ModelRole::Arbiter,
            system_prompt: "You are the planning phase of an autonomous development pipeline. \
                            You read objectives and propose small, concrete tasks with target files. \
                            Check proposed file names against the existing tree before creating tasks; \
                            never propose a file whose name collides with an existing similar file. \
                            Classify surfaced issues: architectural issues become refactoring tasks, \
                            concrete bugs become fix tasks.",
            user_template: "Project stage: {{stage}}\n\n{{context}}\n\nInbox:\n{{inbox}}\n\n\
                            Propose or update tasks for the active objective using the task tools.",
        },
        Coding => PhaseSpec {
            kind,
            model_role: ModelRole::Coder,
            system_prompt: "You are the coding phase. You implement one task at a time. \
                            Discover similar existing files first (list_files, read_file), then create \
                            or modify code through the file tools. Content must use standard JSON \
                            string escaping; never HTML entities.",
            user_template: "Task: {{task}}\nTarget file: {{file}}\nProject stage: {{stage}}\n\n\
                            {{context}}\n\nImplement the task now using the file tools.",
        },
        Qa => PhaseSpec {
            kind,
            model_role: ModelRole::Analyst,
            system_prompt: "You are the QA phase. Review the files under validation. Report concrete \
                            defects with report_qa_issue; approve clean files with approve_code. \
                            Making no report is an implicit approval.",
            user_template: "Task: {{task}}\nFile under review: {{file}}\nProject stage: {{stage}}\n\n\
                            {{context}}\n\nReview now.",
        },
        Debugging => PhaseSpec {
            kind,
            model_role: ModelRole::Coder,
            system_prompt: "You are the debugging phase. You receive concrete bug reports, never \
                            architectural issues. Read the failing file, fix it with modify_file, and \
                            validate the result.",
            user_template: "Bug task: {{task}}\nFile: {{file}}\n\nReports:\n{{inbox}}\n\n{{context}}\n\n\
                            Fix the defect now.",
        },
        Investigation => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the investigation phase. Something is failing for unclear reasons. \
                            Read code, compare files, and build a hypothesis. Report findings; do not fix.",
            user_template: "Investigate: {{task}}\n\nInbox:\n{{inbox}}\n\n{{context}}",
        },
        ApplicationTroubleshooting => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the application troubleshooting phase. The program under test is \
                            misbehaving at runtime. Correlate its captured output with the source and \
                            report the failing component.",
            user_template: "Runtime symptom: {{task}}\n\nChild process output and context:\n{{context}}\n\n\
                            Inbox:\n{{inbox}}",
        },
        Documentation => PhaseSpec {
            kind,
            model_role: ModelRole::Analyst,
            system_prompt: "You are the documentation phase. Update documentation to match the code. \
                            Work only through the file tools.",
            user_template: "Documentation focus: {{task}}\nProject stage: {{stage}}\n\n{{context}}",
        },
        ProjectPlanning => PhaseSpec {
            kind,
            model_role: ModelRole::Arbiter,
            system_prompt: "You are the project planning phase. Assess objective completion, close out \
                            finished objectives, and propose the next objective's first tasks.",
            user_template: "Objectives and completion:\n{{context}}\n\nInbox:\n{{inbox}}",
        },
        Refactoring => PhaseSpec {
            kind,
            model_role: ModelRole::Coder,
            system_prompt: "You are the refactoring phase. Work the refactoring backlog in priority \
                            order: deduplicate, simplify, align names. Update backlog tasks as you go; \
                            block tasks that need developer review.",
            user_template: "Refactoring backlog:\n{{context}}\n\nTask: {{task}}\nStage: {{stage}}",
        },
        PromptDesign => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the prompt design phase. Draft improved prompt text for a phase \
                            that keeps underperforming and submit it with propose_design.",
            user_template: "Observed weakness:\n{{context}}\n\nInbox:\n{{inbox}}",
        },
        PromptImprovement => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the prompt improvement phase. Evaluate pending prompt proposals \
                            with evaluate_design.",
            user_template: "Pending proposals:\n{{context}}",
        },
        RoleDesign => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the role design phase. Draft a new specialist role description and \
                            submit it with propose_design.",
            user_template: "Observed gap:\n{{context}}\n\nInbox:\n{{inbox}}",
        },
        RoleImprovement => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the role improvement phase. Evaluate pending role proposals with \
                            evaluate_design.",
            user_template: "Pending proposals:\n{{context}}",
        },
        ToolDesign => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the tool design phase. Draft a new tool definition and submit it \
                            with propose_design.",
            user_template: "Observed gap:\n{{context}}\n\nInbox:\n{{inbox}}",
        },
        ToolEvaluation => PhaseSpec {
            kind,
            model_role: ModelRole::Reasoner,
            system_prompt: "You are the tool evaluation phase. Evaluate pending tool proposals with \
                            evaluate_design.",
            user_template: "Pending proposals:\n{{context}}",
        },
    }
}
