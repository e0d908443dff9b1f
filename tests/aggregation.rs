use ipnet::{IpNet, Ipv6Net};
use iptree::{Hit, IpTree, Ipv6Tree, Prefix, PrefixLimits, UserDataHooks};

fn ip6(s: &str) -> Ipv6Net {
    s.parse().unwrap()
}

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

fn v6_leafs(tree: &IpTree) -> Vec<Ipv6Net> {
    tree.v6().leafs().map(|n| n.network()).collect()
}

#[test]
fn sequential_sibling_groups_aggregate_separately() {
    // Two /112 groups filled one after the other: each one crosses the
    // /112 limit on its own third host, and by the time the second group
    // collapses the first is already a single leaf, so the /96 checkpoint
    // stays under its limit and both aggregates survive side by side.
    let mut tree: IpTree = IpTree::new();
    tree.add("2001:db8::1:1").unwrap();
    tree.add("2001:db8::1:2").unwrap();
    let hit_a = tree.add("2001:db8::1:3").unwrap();
    assert_eq!(
        hit_a,
        Hit {
            node: net("2001:db8::1:0/112"),
            leafs_removed: vec![net("2001:db8::1:1/128"), net("2001:db8::1:2/128")],
            leafs_added: vec![net("2001:db8::1:0/112")],
        }
    );

    tree.add("2001:db8::2:1").unwrap();
    tree.add("2001:db8::2:2").unwrap();
    let hit_b = tree.add("2001:db8::2:3").unwrap();
    assert_eq!(
        hit_b,
        Hit {
            node: net("2001:db8::2:0/112"),
            leafs_removed: vec![net("2001:db8::2:1/128"), net("2001:db8::2:2/128")],
            leafs_added: vec![net("2001:db8::2:0/112")],
        }
    );

    assert_eq!(
        v6_leafs(&tree),
        vec![ip6("2001:db8::2:0/112"), ip6("2001:db8::1:0/112")]
    );
    assert_eq!(tree.v6().len(), 2);
    let total: u64 = tree.leafs().map(|n| n.hit_count()).sum();
    assert_eq!(total, 6);
}

#[test]
fn interleaved_sibling_groups_collapse_together() {
    // Alternating between two /112 groups reaches the /96 limit before
    // either group reaches its own /112 limit, so everything collapses
    // into one /96 in a single call; the host that triggered it is never
    // reported as a leaf of its own.
    let mut tree: IpTree = IpTree::new();
    tree.add("2001:db8::1:1").unwrap();
    tree.add("2001:db8::2:1").unwrap();
    tree.add("2001:db8::1:2").unwrap();
    let hit = tree.add("2001:db8::2:2").unwrap();
    assert_eq!(
        hit,
        Hit {
            node: net("2001:db8::/96"),
            leafs_removed: vec![
                net("2001:db8::1:1/128"),
                net("2001:db8::1:2/128"),
                net("2001:db8::2:1/128"),
            ],
            leafs_added: vec![net("2001:db8::/96")],
        }
    );

    let node = tree.get("2001:db8::/96").unwrap();
    assert!(node.aggregated());
    assert_eq!(node.hit_count(), 4);
    assert_eq!(tree.v6().len(), 1);
}

#[test]
fn aggregates_collapse_into_a_shallower_aggregate() {
    // Tight custom table: a second host in any /112 collapses it, a third
    // leaf under a /96 collapses the lot. The deepest exceeded checkpoint
    // always wins: the fourth add collapses its own /112 and leaves the
    // /96 count at its limit, while the fifth add pushes the /96 over and
    // swallows both earlier aggregates.
    let limits = PrefixLimits::new([(64, 0), (96, 2), (112, 1), (128, 0)]).unwrap();
    let mut tree: Ipv6Tree = Ipv6Tree::with_limits(limits, UserDataHooks::default()).unwrap();

    tree.add(ip6("2001:db8::1:1/128")).unwrap();
    let hit = tree.add(ip6("2001:db8::1:2/128")).unwrap();
    assert_eq!(hit.node, ip6("2001:db8::1:0/112"));

    tree.add(ip6("2001:db8::2:1/128")).unwrap();
    let hit = tree.add(ip6("2001:db8::2:2/128")).unwrap();
    assert_eq!(
        hit,
        Hit {
            node: ip6("2001:db8::2:0/112"),
            leafs_removed: vec![ip6("2001:db8::2:1/128")],
            leafs_added: vec![ip6("2001:db8::2:0/112")],
        }
    );

    let hit = tree.add(ip6("2001:db8::3:1/128")).unwrap();
    assert_eq!(
        hit,
        Hit {
            node: ip6("2001:db8::/96"),
            leafs_removed: vec![ip6("2001:db8::1:0/112"), ip6("2001:db8::2:0/112")],
            leafs_added: vec![ip6("2001:db8::/96")],
        }
    );

    tree.add(ip6("2001:db8::3:2/128")).unwrap();
    let node = tree.find(&ip6("2001:db8::/96")).unwrap();
    assert!(node.aggregated());
    assert_eq!(node.hit_count(), 6);
    assert_eq!(tree.len(), 1);
}

#[test]
fn ipv4_checkpoint_fires_at_fifty_one_hosts() {
    let mut tree: IpTree = IpTree::new();
    for i in 1..=50u32 {
        let hit = tree.add(format!("192.0.2.{i}")).unwrap();
        assert_eq!(hit.leafs_added.len(), 1);
        assert!(hit.leafs_removed.is_empty());
    }
    let hit = tree.add("192.0.2.51").unwrap();
    assert_eq!(hit.node, net("192.0.2.0/24"));
    assert_eq!(hit.leafs_added, vec![net("192.0.2.0/24")]);
    assert_eq!(hit.leafs_removed.len(), 50);
    let node = tree.get("192.0.2.0/24").unwrap();
    assert!(node.aggregated());
    assert_eq!(node.hit_count(), 51);
    assert_eq!(tree.v4().len(), 1);
}

#[test]
fn aggregate_hook_keeps_the_maximum_counter() {
    let hooks = UserDataHooks::new()
        .on_initial(|| 1u64)
        .on_add(|counter| *counter += 1)
        .on_aggregate(|into, from| *into = from.into_iter().max().unwrap_or(0));
    let mut tree: IpTree<u64> = IpTree::with_hooks(hooks);
    tree.add("2001:db8::1").unwrap();
    tree.add("2001:db8::1").unwrap();
    tree.add("2001:db8::2").unwrap();
    tree.add("2001:db8::3").unwrap();

    let node = tree.get("2001:db8::/112").unwrap();
    assert!(node.aggregated());
    assert_eq!(node.hit_count(), 4);
    assert_eq!(*node.data(), 2);
}

/// Leaves must stay disjoint, aggregates must sit on live checkpoint
/// depths, and no checkpoint may be over its limit once an add returns.
fn check_invariants(tree: &Ipv6Tree, hits_so_far: u64) {
    let leafs: Vec<(Ipv6Net, bool, u64)> = tree
        .leafs()
        .filter(|n| n.hit_count() > 0)
        .map(|n| (n.network(), n.aggregated(), n.hit_count()))
        .collect();

    let total: u64 = leafs.iter().map(|(_, _, hits)| hits).sum();
    assert_eq!(total, hits_so_far, "hit conservation violated");

    for (i, (a, _, _)) in leafs.iter().enumerate() {
        for (b, _, _) in leafs.iter().skip(i + 1) {
            assert!(
                !a.contains(b) && !b.contains(a),
                "leaves overlap: {a} and {b}"
            );
        }
    }

    let live_depths: Vec<u8> = tree
        .prefix_limits()
        .entries()
        .iter()
        .filter(|(_, limit)| *limit > 0)
        .map(|(depth, _)| *depth)
        .collect();
    for (net, aggregated, _) in &leafs {
        if *aggregated {
            assert!(
                live_depths.contains(&net.prefix_len()),
                "aggregate at dead depth: {net}"
            );
        }
    }

    for (depth, limit) in tree.prefix_limits().entries().iter().copied() {
        if limit == 0 {
            continue;
        }
        for (net, _, _) in &leafs {
            if net.prefix_len() < depth {
                continue;
            }
            let anchor = Prefix::supernet(net, depth);
            let below = leafs
                .iter()
                .filter(|(other, _, _)| anchor.contains(other))
                .count();
            assert!(
                below <= limit,
                "checkpoint /{depth} holds {below} leaves (limit {limit})"
            );
        }
    }
}

#[test]
fn invariants_hold_across_a_mixed_run() {
    let mut tree: Ipv6Tree = Ipv6Tree::new();
    let mut hosts: Vec<String> = Vec::new();
    for i in 1..=8u32 {
        hosts.push(format!("2001:db8::1:{i:x}"));
    }
    hosts.push("2001:db8::1:1".to_string());
    hosts.push("2001:db8::2:1".to_string());
    hosts.push("2001:db8::2:2".to_string());
    for i in 1..=4u32 {
        hosts.push(format!("2001:db8:ffff::{i:x}"));
    }
    hosts.push("2001:db8::1:2".to_string());

    for (count, host) in hosts.iter().enumerate() {
        let addr = ip6(&format!("{host}/128"));
        let hit = tree.add(addr).unwrap();
        assert!(hit.leafs_added.len() <= 1);
        check_invariants(&tree, count as u64 + 1);
        // whatever the hit landed on covers the address just added
        let found = tree.find(&addr).unwrap();
        assert!(Prefix::contains(&found.network(), &addr));
        assert_eq!(found.network(), hit.node);
    }
}
