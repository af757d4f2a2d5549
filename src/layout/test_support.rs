//! Small family fixtures shared by the stage unit tests.

use crate::ir::{Gender, Partnership, PartnershipStatus, Person, StromData};

pub(crate) fn person(id: &str, gender: Gender) -> Person {
    Person {
        id: id.to_string(),
        first_name: id.to_string(),
        gender,
        ..Default::default()
    }
}

pub(crate) fn add_people(data: &mut StromData, ids: &[&str]) {
    for (idx, id) in ids.iter().enumerate() {
        let gender = if idx % 2 == 0 {
            Gender::Male
        } else {
            Gender::Female
        };
        data.insert_person(person(id, gender));
    }
}

pub(crate) fn couple(data: &mut StromData, id: &str, a: &str, b: Option<&str>, kids: &[&str]) {
    data.insert_partnership(Partnership {
        id: id.to_string(),
        person1_id: a.to_string(),
        person2_id: b.map(str::to_string),
        child_ids: kids.iter().map(|k| k.to_string()).collect(),
        status: PartnershipStatus::Married,
        ..Default::default()
    });
}

/// dad + mom with kid1 and kid2.
pub(crate) fn nuclear_family() -> StromData {
    let mut data = StromData::new();
    add_people(&mut data, &["dad", "mom", "kid1", "kid2"]);
    couple(&mut data, "u_parents", "dad", Some("mom"), &["kid1", "kid2"]);
    data
}

/// Both grandparent couples, parents, an aunt with a cousin, and the focus `me`
/// with a spouse and a child.
pub(crate) fn three_generations() -> StromData {
    let mut data = StromData::new();
    add_people(
        &mut data,
        &[
            "grandpa",
            "grandma",
            "mom_father",
            "mom_mother",
            "dad",
            "mom",
            "aunt",
            "uncle",
            "me",
            "spouse",
            "sister",
            "cousin",
            "child",
        ],
    );
    couple(&mut data, "u_gp", "grandpa", Some("grandma"), &["dad", "aunt"]);
    couple(&mut data, "u_mgp", "mom_father", Some("mom_mother"), &["mom"]);
    couple(&mut data, "u_parents", "dad", Some("mom"), &["me", "sister"]);
    couple(&mut data, "u_aunt", "aunt", Some("uncle"), &["cousin"]);
    couple(&mut data, "u_me", "me", Some("spouse"), &["child"]);
    data
}

/// A couple with three children: a single, a couple with one child, a single.
pub(crate) fn three_children() -> StromData {
    let mut data = StromData::new();
    add_people(&mut data, &["r1", "r2", "a", "b", "c", "b_spouse", "b_child"]);
    couple(&mut data, "u_root", "r1", Some("r2"), &["a", "b", "c"]);
    couple(&mut data, "u_b", "b", Some("b_spouse"), &["b_child"]);
    data
}

/// `x` married twice, one child from each marriage.
pub(crate) fn remarriage() -> StromData {
    let mut data = StromData::new();
    add_people(&mut data, &["x", "s1", "s2", "k1", "k2"]);
    couple(&mut data, "u_first", "x", Some("s1"), &["k1"]);
    couple(&mut data, "u_second", "x", Some("s2"), &["k2"]);
    data
}

/// `me` with a married brother and a spouse whose parents are known.
pub(crate) fn in_law_family() -> StromData {
    let mut data = StromData::new();
    add_people(
        &mut data,
        &["dad", "mom", "me", "sp", "bro", "bro_w", "nephew", "spf", "spm"],
    );
    couple(&mut data, "u_parents", "dad", Some("mom"), &["me", "bro"]);
    couple(&mut data, "u_bro", "bro", Some("bro_w"), &["nephew"]);
    couple(&mut data, "u_me", "me", Some("sp"), &[]);
    couple(&mut data, "u_sp", "spf", Some("spm"), &["sp"]);
    data
}
