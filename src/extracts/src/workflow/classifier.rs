use std::sync::LazyLock;

use regex::Regex;

static WORKFLOW_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Successfully started workflow with id.*HighAvailabilityWorkflow.*vms=\{(.*?)\}.*_(\d+)$")
        .expect("valid workflow start pattern")
});
static MARK_RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Marking resource unhealthy for (.*?), resource").expect("valid attempt pattern")
});
static MARK_INNER_STACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Marking inner stack unhealthy for (.*?)$").expect("valid attempt pattern")
});
static VM_RESTORED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VM \( (.*?) \) successfully restored").expect("valid recovered pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// One start line may name several entities; they share the workflow id.
    Start {
        workflow_id: String,
        entities: Vec<String>,
    },
    Attempt {
        entity: String,
    },
    Recovered {
        entity: String,
    },
}

/// Labels a log line. Returns nothing for lines outside the workflow vocabulary.
pub fn classify(line: &str) -> Vec<Trigger> {
    let line = line.trim_end();
    let mut triggers = Vec::new();

    if let Some(caps) = WORKFLOW_START.captures(line) {
        triggers.push(Trigger::Start {
            workflow_id: caps[2].to_string(),
            entities: vm_names(&caps[1]),
        });
    }

    let attempt = MARK_RESOURCE
        .captures(line)
        .or_else(|| MARK_INNER_STACK.captures(line));
    if let Some(caps) = attempt {
        triggers.push(Trigger::Attempt {
            entity: caps[1].to_string(),
        });
    }

    if let Some(caps) = VM_RESTORED.captures(line) {
        triggers.push(Trigger::Recovered {
            entity: caps[1].to_string(),
        });
    }

    triggers
}

pub fn is_relevant(line: &str) -> bool {
    let line = line.trim_end();
    [&WORKFLOW_START, &MARK_RESOURCE, &MARK_INNER_STACK, &VM_RESTORED]
        .iter()
        .any(|re| re.is_match(line))
}

// "name":"ip","name":"ip"
fn vm_names(pairs: &str) -> Vec<String> {
    pairs
        .split(',')
        .filter_map(|pair| pair.split(':').next())
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
