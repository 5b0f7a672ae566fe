//! 三块积木叠放
//!
//! 积木按红、绿、蓝的顺序叠在桌面前方中间。每块由离得近的那只臂抓取；
//! 换臂时另一只臂同时回到待机位姿让出空间。

use async_trait::async_trait;
use nalgebra::Vector3;

use crate::core::EpisodeError;
use crate::episode::{SceneSetup, Session, Stage};
use crate::geometry::{ArmTag, PlaceTarget};
use crate::placement::{PlacementConstraints, PoseSampler, TABLE_HEIGHT};
use crate::plan::{GraspSpec, PlaceSpec, PreDisAxis};
use crate::sim::{ActorId, ActorSpec};
use crate::success::SuccessPredicate;

const MODEL: &str = "box";
const HALF_SIZE: f64 = 0.025;
const NAMES: [&str; 3] = ["red block", "green block", "blue block"];
/// 第一块积木的落点，之后每块叠在上一块的顶面
const FIRST_TARGET: [f64; 7] = [0.0, -0.13, 0.75, 0.0, 1.0, 0.0, 0.0];
const LIFT: f64 = 0.07;

pub struct StackBlocksThree {
    blocks: Vec<ActorId>,
}

impl StackBlocksThree {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// 抓起一块积木叠到上一块上，返回所用的臂
    async fn pick_and_place(session: &mut Session<'_>, block: ActorId) -> Result<ArmTag, EpisodeError> {
        let position = session.sim().actor_pose(block)?.position;
        let arm = ArmTag::nearest_to(position.x);

        let compiler = session.compiler();
        let grasp = compiler.grasp_actor(block, arm, GraspSpec::new().pre_grasp(0.09))?;
        match session.ctx.last_arm {
            Some(prev) if prev != arm => {
                let home = compiler.back_to_origin(arm.opposite());
                session.move_both(grasp, home).await?;
            }
            _ => {
                session.move_arms(grasp).await;
            }
        }
        session.displace(arm, Vector3::new(0.0, 0.0, LIFT)).await;

        let target = match session.ctx.last_actor {
            Some(below) => PlaceTarget::Pose(session.sim().functional_point(below, 1)?),
            None => PlaceTarget::from(FIRST_TARGET),
        };
        let place = session.compiler().place_actor(
            block,
            target,
            arm,
            PlaceSpec::new()
                .functional_point(0)
                .distances(0.05, 0.0)
                .axis(PreDisAxis::FunctionalPoint),
        )?;
        session.move_arms(place).await;
        session.displace(arm, Vector3::new(0.0, 0.0, LIFT)).await;

        session.ctx.last_arm = Some(arm);
        session.ctx.last_actor = Some(block);
        Ok(arm)
    }
}

impl Default for StackBlocksThree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for StackBlocksThree {
    fn name(&self) -> &'static str {
        "stack_blocks_three"
    }

    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError> {
        let sampler = PoseSampler::new([-0.28, 0.28], [-0.08, 0.05])
            .with_z(TABLE_HEIGHT + HALF_SIZE)
            .with_ylim_prop()
            .with_rotation([0.0, 0.0, 0.75]);
        // 叠放区前方留空；积木可以放在瓶子的禁放区里
        let constraints = PlacementConstraints::new()
            .centerline(scene.centerline())
            .min_distance(0.1)
            .keep_out([0.0, -0.1], 0.15)
            .ignore_zones();

        self.blocks.clear();
        for _ in NAMES {
            let pose = scene.place(&sampler, &constraints);
            let block = scene.spawn(ActorSpec::new(MODEL, 0, pose))?;
            self.blocks.push(block);
        }
        for block in &self.blocks {
            scene.prohibit(*block, 0.05)?;
        }
        scene.prohibit_bounds([-0.04, -0.13, 0.04, -0.05]);

        scene.add_success(
            self.name(),
            SuccessPredicate::Stacked {
                actors: self.blocks.clone(),
                spacing: 2.0 * HALF_SIZE,
                eps: Vector3::new(0.025, 0.025, 0.012),
            },
        );
        Ok(())
    }

    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError> {
        if self.blocks.is_empty() {
            return Err(EpisodeError::InvalidStep(format!(
                "stage '{}' played before setup",
                self.name()
            )));
        }

        session.ctx.last_actor = None;
        session.ctx.last_arm = None;
        let mut arms = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            arms.push(Self::pick_and_place(session, *block).await?);
        }

        let info = &mut session.ctx.info;
        for (i, (name, arm)) in NAMES.iter().zip(&arms).enumerate() {
            let slot = (b'A' + i as u8) as char;
            info.insert(format!("{{{slot}}}"), *name);
            info.insert(format!("{{{}}}", slot.to_ascii_lowercase()), arm.as_str());
        }
        Ok(())
    }
}
