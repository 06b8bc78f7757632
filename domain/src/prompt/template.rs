//! Prompt templates for each discussion mode

use crate::discussion::mode::DiscussionMode;
use crate::member::Member;

/// Marker a member puts in its reply to signal the discussion has converged.
pub const CONSENSUS_MARKER: &str = "[[CONSENSUS]]";

/// Templates for generating prompts at each stage of a round
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for a member speaking in a group discussion
    pub fn member_system(
        member: &Member,
        others: &[&str],
        mode: DiscussionMode,
        manager: Option<&str>,
    ) -> String {
        let others = if others.is_empty() {
            "nobody else".to_string()
        } else {
            others.join(", ")
        };
        let persona = member
            .persona()
            .unwrap_or("An easygoing participant who keeps answers practical.");

        let mut prompt = format!(
            r#"You are "{name}", an assistant taking part in a group chat with other assistants.
The goal of the group is to solve the user's problem.

Other participants: {others}
(Address others by these names only. Never address yourself.)

Rules:
1. Everything you say should move the user's problem forward.
2. If you do not know something, say so. Do not invent facts.
3. Keep replies short unless the question needs depth.
4. Do not repeat points that were already made.

Your persona:
{persona}
"#,
            name = member.name(),
        );

        match mode {
            DiscussionMode::Free => prompt.push_str(&format!(
                r#"
Mode: free discussion.
Engage with the others: build on, agree with or challenge their points.
When the group has clearly reached a conclusion, state it in one sentence and end your reply with {CONSENSUS_MARKER}."#
            )),
            DiscussionMode::Leader => {
                let lead = manager.unwrap_or("the manager");
                prompt.push_str(&format!(
                    r#"
Mode: leader-guided discussion.
{lead} has framed the problem above. Follow that direction and contribute your own angle."#
                ));
            }
            DiscussionMode::Task => prompt.push_str(
                r#"
Mode: task split.
You own one part of the work. Deliver that part completely and do not do the others' parts."#,
            ),
            DiscussionMode::Qa => prompt.push_str(
                r#"
Mode: question and answer.
Answer the user directly with your own independent view. Use earlier history only if the user is following up on it."#,
            ),
        }

        prompt
    }

    /// System prompt for the manager opening a leader round
    pub fn manager_system(manager: &Member, members: &[&str]) -> String {
        format!(
            r#"You are "{name}", the moderator of a group chat between assistants: {members}.
You speak first in every round. Restate the user's problem, split it into the questions the group must answer and say who should focus on what.
Do not solve the whole problem yourself."#,
            name = manager.name(),
            members = members.join(", "),
        )
    }

    /// Instruction for a free-mode turn
    pub fn free_turn(round: usize, max_rounds: usize) -> String {
        if round <= 1 {
            "Reply to the user's latest message, taking into account what the others have said."
                .to_string()
        } else {
            format!(
                "Discussion pass {round} of {max_rounds}. Respond to the points raised since your last reply."
            )
        }
    }

    /// Instruction for a member after the manager has spoken
    pub fn leader_followup(manager: &str) -> String {
        format!("{manager} has set the direction above. Give your contribution.")
    }

    /// Instruction for one member's task in task mode
    pub fn task_turn(task: &str, topic: &str) -> String {
        format!(
            r#"Your task:
{task}

Overall topic:
{topic}

Deliver only your task's result."#
        )
    }

    /// Instruction for a qa turn
    pub fn qa_turn(topic: &str) -> String {
        format!("Answer the following independently:\n\n{topic}")
    }

    /// System prompt for writing a conclusion of the discussion
    pub fn conclusion_system() -> &'static str {
        r#"You are a careful note-taker. Read the discussion, extract the core questions, each participant's position, what was agreed and what is still open.
Finish with a clear conclusion."#
    }

    /// Instruction for writing a conclusion
    pub fn conclusion_turn(instruction: Option<&str>) -> String {
        match instruction {
            Some(extra) if !extra.trim().is_empty() => {
                format!("Summarize the discussion above.\n\nAdditional instruction: {extra}")
            }
            _ => "Summarize the discussion above.".to_string(),
        }
    }

    /// System prompt for condensing old history during compaction
    pub fn compaction_system() -> &'static str {
        r#"You condense the earlier part of a group discussion so it can continue within a limited context.
Keep who said what, the decisions made, open questions and any numbers or names that were mentioned.
Write plain prose. Do not add opinions of your own."#
    }

    /// Instruction carrying the transcript to condense
    pub fn compaction_turn(transcript: &str) -> String {
        format!("Condense the following discussion history:\n\n{transcript}")
    }

    /// Notice appended when a round is cancelled
    pub fn interrupted_notice() -> &'static str {
        "Discussion interrupted before all turns completed."
    }

    /// Notice appended when a member ends the discussion early
    pub fn consensus_notice(member: &str) -> String {
        format!("{member} signalled consensus; the discussion ends here.")
    }

    /// Remove the consensus marker from a reply.
    ///
    /// Returns the cleaned text and whether the marker was present.
    pub fn strip_consensus(content: &str) -> (String, bool) {
        if content.contains(CONSENSUS_MARKER) {
            (content.replace(CONSENSUS_MARKER, "").trim().to_string(), true)
        } else {
            (content.to_string(), false)
        }
    }
}
